//! Subcommand implementations.

pub(crate) mod completions;
pub(crate) mod list;

pub(crate) use {
    completions::cmd_completions,
    list::{DeviceFilter, ListOptions, cmd_list},
};
