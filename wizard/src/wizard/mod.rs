// Wizard engine: steps, validators, derived values and navigation.

pub mod controller;
pub mod handle;
pub mod history;
pub mod nutrition;
pub mod pricing;
pub mod sport;
pub mod steps;
pub mod validators;
