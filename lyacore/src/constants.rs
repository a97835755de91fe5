// Purpose: To store physical and spectroscopic constants used across the pipeline
pub const SPEED_LIGHT: f64 = 299792.458; // km/s

// Rest-frame wavelengths of IGM absorption transitions [Angstrom]
pub const LAMBDA_LYA: f64 = 1215.67;
pub const LAMBDA_LYB: f64 = 1025.72;

/// Rest-frame wavelength of a named IGM absorption transition in Angstrom.
///
/// The name selects which transition defines the redshift of the forest
/// pixels (e.g. "LYA" for the Lyman-alpha forest, "SiIV(1394)" or
/// "CIV(1548)" for metal forests).
pub fn absorber_igm(name: &str) -> Option<f64> {
    match name {
        "LYA" => Some(LAMBDA_LYA),
        "LYB" => Some(LAMBDA_LYB),
        "SiIV(1394)" => Some(1393.76018),
        "SiIV(1403)" => Some(1402.77291),
        "CIV(1548)" => Some(1548.2049),
        "CIV(1551)" => Some(1550.77845),
        "SiII(1260)" => Some(1260.4221),
        "SiIII(1207)" => Some(1206.500),
        "NV(1239)" => Some(1238.821),
        "NV(1243)" => Some(1242.804),
        "MgII(2796)" => Some(2796.3511),
        "MgII(2804)" => Some(2803.5324),
        _ => None,
    }
}
