pub mod account_writer;
pub mod script_reader;
