// data module
pub mod data {
    pub mod binning;
    pub mod spectrum;
}

// pk1d module
pub mod pk1d {
    pub mod split;
    pub mod fill;
    pub mod rebin;
    pub mod power;
    pub mod resolution;
    pub mod pipeline;
}

// masks module
pub mod masks {
    pub mod voigt;
    pub mod dla;
}

pub mod constants;
pub mod error;
