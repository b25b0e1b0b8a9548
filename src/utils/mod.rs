// Utilities module
//
// - validation: endpoint and port validation helpers

pub mod validation;
