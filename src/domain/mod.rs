// Domain layer: outcomes, checks, probes and the section seam.

pub mod model;
pub mod ports;
