pub mod check;
pub mod export;
pub mod lut;
pub mod shader;
