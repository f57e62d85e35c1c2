//! Vagrant box management and VM startup commands.

use std::path::Path;

use crate::runner::ToolCommand;

/// `vagrant box list`
pub fn box_list_command(vagrant: &str) -> ToolCommand {
    ToolCommand::new(vagrant, "vagrant-box-list").args(["box", "list"])
}

/// `vagrant box remove <name>`
pub fn box_remove_command(vagrant: &str, name: &str) -> ToolCommand {
    ToolCommand::new(vagrant, "vagrant-box-remove").args(["box", "remove", name])
}

/// `vagrant box add --name <name> <artifact>`
pub fn box_add_command(vagrant: &str, name: &str, artifact: &Path) -> ToolCommand {
    ToolCommand::new(vagrant, "vagrant-box-add")
        .args(["box", "add", "--name", name])
        .arg(artifact.display().to_string())
}

/// `vagrant up`
pub fn up_command(vagrant: &str) -> ToolCommand {
    ToolCommand::new(vagrant, "vagrant-up").arg("up")
}

/// Whether `vagrant box list` output contains a box called exactly `name`.
///
/// Each line looks like `buildkite_agent (virtualbox, 0)`; the box name is
/// the first column.
pub fn box_registered(list_output: &str, name: &str) -> bool {
    list_output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .any(|listed| listed == name)
}
