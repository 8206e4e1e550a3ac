pub mod check;
pub mod dataset;
pub mod doctor;
pub mod run;
