// src/lib.rs
pub mod io {
    pub mod delta;
    pub mod dla_catalogue;
    pub mod writer;
}

pub mod run;
