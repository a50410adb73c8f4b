use uuid::Uuid;

use crate::models::capabilities::{DeviceCapabilities, VideoFormat};
use crate::models::config::{CaptureConfiguration, Lens};
use crate::models::error::CaptureError;
use crate::models::graph::{GraphInputs, GraphLayout, GraphPlan, Port};
use crate::models::state::SessionSnapshot;
use crate::traits::capture_device::CaptureDevice;

/// The live capture graph.
pub(crate) struct CaptureSession {
    id: Uuid,
    revision: u64,
    configuration: CaptureConfiguration,
    inputs: GraphInputs,
    layout: GraphLayout,
}

impl CaptureSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn configuration(&self) -> &CaptureConfiguration {
        &self.configuration
    }

    pub fn has_port(&self, port: Port) -> bool {
        self.layout.contains(port)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            revision: self.revision,
            configuration: self.configuration,
            ports: self.layout.ports.clone(),
            running: true,
        }
    }
}

/// A mutation that was applied and how to take it back.
enum Undo {
    Detach(Port),
    Attach(Port),
}

/// Builds, mutates and tears down the single capture session.
///
/// Lives on the session queue; nothing else touches the device graph, so
/// no command can observe a reconfigure half applied.
#[derive(Default)]
pub(crate) struct SessionBuilder {
    session: Option<CaptureSession>,
}

impl SessionBuilder {
    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.session.as_ref().map(CaptureSession::snapshot)
    }

    /// Build a fresh graph for `config`, replacing any existing session.
    pub fn setup(
        &mut self,
        device: &mut dyn CaptureDevice,
        capabilities: &DeviceCapabilities,
        config: CaptureConfiguration,
        inputs: GraphInputs,
    ) -> Result<&CaptureSession, CaptureError> {
        capabilities.check(&config)?;
        if self.session.is_some() {
            self.teardown(device);
        }

        let layout = GraphLayout::for_configuration(&config, inputs);
        let plan = GraphLayout::default().diff(&layout);

        device.begin_configuration();
        let mut undo = Vec::new();
        let applied = apply_plan(device, &plan, &mut undo).and_then(|_| device.commit_configuration());
        if let Err(e) = applied {
            log::error!("capture session setup failed: {}", e);
            roll_back(device, undo, None);
            return Err(e);
        }

        if let Err(e) = device.start_running() {
            log::error!("capture session failed to start running: {}", e);
            device.begin_configuration();
            for port in layout.ports.iter().rev() {
                device.detach(*port);
            }
            let _ = device.commit_configuration();
            return Err(e);
        }

        let session = CaptureSession {
            id: Uuid::new_v4(),
            revision: 1,
            configuration: config,
            inputs,
            layout,
        };
        log::info!(
            "capture session {} running: {:?} {} @ {} fps, {} ports",
            session.id,
            config.lens,
            config.resolution,
            config.frame_rate.fps(),
            session.layout.ports.len()
        );
        Ok(self.session.insert(session))
    }

    /// Move the live graph to `config`, touching only the ports that differ.
    ///
    /// Returns whether the graph was mutated. An identical configuration is
    /// a no-op and keeps the session revision. If a mutation fails, the
    /// applied steps are undone; if that fails too, the session is torn
    /// down and must be set up again.
    pub fn reconfigure(
        &mut self,
        device: &mut dyn CaptureDevice,
        capabilities: &DeviceCapabilities,
        config: CaptureConfiguration,
        inputs: GraphInputs,
    ) -> Result<bool, CaptureError> {
        capabilities.check(&config)?;
        let Some(session) = self.session.as_mut() else {
            return Err(CaptureError::NotConfigured);
        };
        if session.configuration == config && session.inputs == inputs {
            log::debug!("reconfigure to current configuration ignored");
            return Ok(false);
        }

        let target = GraphLayout::for_configuration(&config, inputs);
        let plan = session.layout.diff(&target);
        if plan.is_empty() {
            // Nothing in the graph depends on what changed.
            session.configuration = config;
            session.inputs = inputs;
            return Ok(false);
        }

        log::info!(
            "reconfiguring session {}: detach {:?}, attach {:?}, format {:?}",
            session.id,
            plan.detach,
            plan.attach,
            plan.video_format
        );

        device.begin_configuration();
        let mut undo = Vec::new();
        let applied = apply_plan(device, &plan, &mut undo).and_then(|_| device.commit_configuration());

        match applied {
            Ok(()) => {
                session.layout = target;
                session.configuration = config;
                session.inputs = inputs;
                session.revision += 1;
                Ok(true)
            }
            Err(e) => {
                log::warn!("reconfigure failed, restoring previous graph: {}", e);
                let restore = session.layout.camera().zip(session.layout.video_format);
                if !roll_back(device, undo, restore) {
                    log::error!("could not restore session {}, tearing it down", session.id);
                    self.teardown(device);
                }
                Err(e)
            }
        }
    }

    /// Stop the session and release every port. No-op without a session.
    pub fn teardown(&mut self, device: &mut dyn CaptureDevice) {
        let Some(session) = self.session.take() else {
            return;
        };
        device.stop_running();
        device.begin_configuration();
        for port in session.layout.ports.iter().rev() {
            device.detach(*port);
        }
        if let Err(e) = device.commit_configuration() {
            log::warn!("teardown of session {} did not commit cleanly: {}", session.id, e);
        }
        log::info!("capture session {} torn down", session.id);
    }
}

fn apply_plan(
    device: &mut dyn CaptureDevice,
    plan: &GraphPlan,
    undo: &mut Vec<Undo>,
) -> Result<(), CaptureError> {
    for port in &plan.detach {
        device.detach(*port);
        undo.push(Undo::Attach(*port));
    }
    for port in &plan.attach {
        device.attach(*port)?;
        undo.push(Undo::Detach(*port));
    }
    if let Some((lens, format)) = plan.video_format {
        device.set_video_format(lens, format)?;
    }
    Ok(())
}

/// Undo applied steps in reverse, then restore the previous camera format.
/// Returns false if the device refused any step.
fn roll_back(device: &mut dyn CaptureDevice, undo: Vec<Undo>, restore: Option<(Lens, VideoFormat)>) -> bool {
    device.begin_configuration();
    let mut clean = true;
    for step in undo.into_iter().rev() {
        let result = match step {
            Undo::Detach(port) => {
                device.detach(port);
                Ok(())
            }
            Undo::Attach(port) => device.attach(port),
        };
        if let Err(e) = result {
            log::warn!("rollback step failed: {}", e);
            clean = false;
        }
    }
    if let Some((lens, format)) = restore {
        if let Err(e) = device.set_video_format(lens, format) {
            log::warn!("could not restore {} format: {}", lens, e);
            clean = false;
        }
    }
    if let Err(e) = device.commit_configuration() {
        log::warn!("rollback commit failed: {}", e);
        clean = false;
    }
    clean
}
