pub mod check;
pub mod cli;
pub mod scan;
pub mod serve;
