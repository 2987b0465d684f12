//! Unit test harness for stepper-servo.
//!
//! Configuration tests driven through the public API.

mod config_parsing;
mod config_validation;
