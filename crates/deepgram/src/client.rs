pub(crate) mod config;
pub(crate) mod consts;
pub(crate) mod listen;
pub(crate) mod speak;
mod utils;
