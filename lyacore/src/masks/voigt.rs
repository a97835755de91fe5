use num_complex::Complex64;

const INV_SQRT_PI: f64 = 0.5641895835477563; // 1 / sqrt(pi)

/// Real part of the Faddeeva function w(x + iy) for y >= 0, using the
/// four-region rational approximation of Humlicek (1982), accurate to a
/// relative error of about 1e-4 over the whole plane.
fn faddeeva_real(x: f64, y: f64) -> f64 {
    if y == 0.0 {
        // limit: Re w(x) = exp(-x^2)
        return (-x * x).exp();
    }

    let t = Complex64::new(y, -x);
    let s = x.abs() + y;

    let w = if s >= 15.0 {
        t * INV_SQRT_PI / (0.5 + t * t)
    } else if s >= 5.5 {
        let u = t * t;
        t * (1.410474 + u * INV_SQRT_PI) / (0.75 + u * (3.0 + u))
    } else if y >= 0.195 * x.abs() - 0.176 {
        (16.4955 + t * (20.20933 + t * (11.96482 + t * (3.778987 + t * 0.5642236))))
            / (16.4955
                + t * (38.82363 + t * (39.27121 + t * (21.69274 + t * (6.699398 + t)))))
    } else {
        let u = t * t;
        let numerator = t
            * (36183.31
                - u * (3321.9905
                    - u * (1540.787
                        - u * (219.0313 - u * (35.76683 - u * (1.320522 - u * 0.56419))))));
        let denominator = 32066.6
            - u * (24322.84
                - u * (9022.228
                    - u * (2186.181
                        - u * (364.2191 - u * (61.57037 - u * (1.841439 - u))))));
        u.exp() - numerator / denominator
    };
    w.re
}

/// Voigt profile: the convolution of a Gaussian of standard deviation
/// `sigma` with a Lorentzian of half-width `gamma`, evaluated at `x`.
///
/// Normalized to unit area.
pub fn voigt_profile(x: f64, sigma: f64, gamma: f64) -> f64 {
    let scale = sigma * std::f64::consts::SQRT_2;
    faddeeva_real(x / scale, gamma / scale) / (sigma * (2.0 * std::f64::consts::PI).sqrt())
}
