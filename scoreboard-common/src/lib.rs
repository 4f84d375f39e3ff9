pub mod bundles;

pub mod protocol;

pub mod state;

pub mod time_format;
