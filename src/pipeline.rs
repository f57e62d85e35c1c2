//! The provisioning pipeline: build the box, register it, render the
//! Vagrantfile and boot the agents. Every step runs to completion before
//! the next one starts.

use std::path::PathBuf;

use crate::config::Config;
use crate::error::VmAgentError;
use crate::packer::{self, BuildVars};
use crate::progress::{Step, StepProgress};
use crate::runner::{CommandOutcome, CommandRunner, ToolCommand};
use crate::vagrant;
use crate::vagrantfile::{VagrantfileContext, VagrantfileRenderer};

/// Number of numbered steps shown by [`provision`].
pub const STEPS: usize = 5;

/// Validated command-line inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    pub token: String,
    pub vm_number: u32,
    pub google_credential: String,
    pub name: String,
    pub memory: u32,
    pub cpus: u32,
}

impl ProvisionRequest {
    pub fn build_vars(&self) -> BuildVars {
        BuildVars {
            agent_token: self.token.clone(),
            memory: self.memory,
            google_credential: self.google_credential.clone(),
        }
    }

    pub fn vagrantfile_context(&self) -> VagrantfileContext {
        VagrantfileContext {
            name: self.name.clone(),
            number: self.vm_number,
            memory: self.memory,
            cpus: self.cpus,
        }
    }
}

/// What a finished run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    pub removed_stale_artifact: bool,
    pub replaced_box: bool,
    pub vagrantfile: PathBuf,
    /// Actions whose tool exited non-zero.
    pub failed_actions: Vec<String>,
}

/// Run a tool inside `step`, streaming its output. A non-zero exit is
/// recorded and logged but never stops the pipeline.
async fn run_tool<R: CommandRunner>(
    runner: &R,
    cmd: &ToolCommand,
    step: &Step,
    report: &mut ProvisionReport,
) -> Result<CommandOutcome, VmAgentError> {
    let outcome = runner.run(cmd, &|line| step.log(line)).await?;
    if !outcome.success() {
        let status = match outcome.code {
            Some(code) => format!("exit code {code}"),
            None => "killed by signal".to_string(),
        };
        tracing::warn!(command = %cmd, %status, "tool failed, continuing");
        step.warn(format!("{} {status}", cmd.program));
        report.failed_actions.push(cmd.action.clone());
    }
    Ok(outcome)
}

pub async fn provision<R: CommandRunner>(
    runner: &R,
    config: &Config,
    request: &ProvisionRequest,
    progress: &mut StepProgress,
) -> Result<ProvisionReport, VmAgentError> {
    let mut report = ProvisionReport::default();
    let artifact = config.artifact_path();

    tracing::info!(
        name = %request.name,
        vms = request.vm_number,
        memory = request.memory,
        cpus = request.cpus,
        "provisioning build agents"
    );

    // A leftover box would satisfy the artifact poll before the new build
    // has written anything.
    report.removed_stale_artifact = packer::remove_stale_artifact(&artifact)?;
    if report.removed_stale_artifact {
        progress.info(&format!("removed stale {}", artifact.display()));
    }

    let build = packer::build_command(
        &config.tools.packer,
        &request.build_vars(),
        &config.build.template,
    );
    progress
        .run("Building image with Packer", |step| {
            let report = &mut report;
            let build = &build;
            async move {
                run_tool(runner, build, &step, report).await?;
                Ok::<_, VmAgentError>(())
            }
        })
        .await?;

    let interval = config.poll_interval();
    progress
        .run(&format!("Waiting for {}", artifact.display()), |step| {
            let artifact = &artifact;
            async move {
                packer::wait_for_artifact(artifact, interval).await;
                step.set_done_label("Vagrant box successfully generated.");
            }
        })
        .await;

    progress
        .run(&format!("Registering box '{}'", request.name), |step| {
            let report = &mut report;
            let artifact = &artifact;
            async move {
                let list = vagrant::box_list_command(&config.tools.vagrant);
                let listed = run_tool(runner, &list, &step, report).await?;

                if vagrant::box_registered(&listed.stdout, &request.name) {
                    tracing::info!(name = %request.name, "removing previously registered box");
                    let remove = vagrant::box_remove_command(&config.tools.vagrant, &request.name);
                    run_tool(runner, &remove, &step, report).await?;
                    report.replaced_box = true;
                }

                let add = vagrant::box_add_command(&config.tools.vagrant, &request.name, artifact);
                run_tool(runner, &add, &step, report).await?;

                step.set_done_label(if report.replaced_box {
                    format!("Replaced box '{}'", request.name)
                } else {
                    format!("Registered box '{}'", request.name)
                });
                Ok::<_, VmAgentError>(())
            }
        })
        .await?;

    let output = config.vagrantfile_path();
    report.vagrantfile = progress
        .run("Rendering Vagrantfile", |step| {
            let output = &output;
            async move {
                let renderer = VagrantfileRenderer::load(config.template_override().as_deref())?;
                let written = renderer.render_to_file(&request.vagrantfile_context(), output)?;
                step.set_done_label(format!("Rendered {}", written.display()));
                Ok::<_, VmAgentError>(written)
            }
        })
        .await?;

    let label = match request.vm_number {
        1 => "Starting 1 agent".to_string(),
        n => format!("Starting {n} agents"),
    };
    progress
        .run(&label, |step| {
            let report = &mut report;
            async move {
                let up = vagrant::up_command(&config.tools.vagrant);
                run_tool(runner, &up, &step, report).await?;
                Ok::<_, VmAgentError>(())
            }
        })
        .await?;

    Ok(report)
}
