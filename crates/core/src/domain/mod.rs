pub mod case;
pub mod gateway;
