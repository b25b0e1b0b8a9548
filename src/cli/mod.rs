// Command line interface
//
// - arguments: clap definitions and one-shot subcommands

pub mod arguments;

pub use arguments::PanelArguments;
