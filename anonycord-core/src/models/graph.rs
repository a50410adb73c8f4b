use serde::{Deserialize, Serialize};

use super::capabilities::{AudioFormat, VideoFormat};
use super::config::{CaptureConfiguration, Lens};

/// One node of the capture graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Port {
    Camera(Lens),
    Microphone(AudioFormat),
    MovieOutput,
    AudioOutput,
    PhotoOutput,
}

impl Port {
    pub fn is_input(&self) -> bool {
        matches!(self, Self::Camera(_) | Self::Microphone(_))
    }
}

/// Which inputs the graph may include, derived from granted permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphInputs {
    pub camera: bool,
    pub microphone: bool,
}

/// The ports and camera format a configuration calls for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphLayout {
    pub ports: Vec<Port>,
    pub video_format: Option<VideoFormat>,
}

impl GraphLayout {
    pub fn for_configuration(config: &CaptureConfiguration, inputs: GraphInputs) -> Self {
        let mut ports = Vec::with_capacity(5);
        if inputs.camera {
            ports.push(Port::Camera(config.lens));
        }
        if inputs.microphone {
            ports.push(Port::Microphone(config.audio_format()));
        }
        if inputs.camera {
            ports.push(Port::MovieOutput);
            ports.push(Port::PhotoOutput);
        }
        if inputs.microphone {
            ports.push(Port::AudioOutput);
        }
        Self {
            ports,
            video_format: inputs.camera.then(|| config.video_format()),
        }
    }

    pub fn contains(&self, port: Port) -> bool {
        self.ports.contains(&port)
    }

    pub fn camera(&self) -> Option<Lens> {
        self.ports.iter().find_map(|p| match p {
            Port::Camera(lens) => Some(*lens),
            _ => None,
        })
    }

    /// Mutations turning `self` into `target`.
    ///
    /// Ports present in both layouts are left alone; a format change on an
    /// unchanged camera is applied in place. A newly attached camera always
    /// gets its format set.
    pub fn diff(&self, target: &GraphLayout) -> GraphPlan {
        let detach = self
            .ports
            .iter()
            .filter(|p| !target.ports.contains(p))
            .copied()
            .collect();
        let attach = target
            .ports
            .iter()
            .filter(|p| !self.ports.contains(p))
            .copied()
            .collect();
        let camera_swapped = target.camera() != self.camera();
        let video_format = match (target.camera(), target.video_format) {
            (Some(lens), Some(format)) if camera_swapped || target.video_format != self.video_format => {
                Some((lens, format))
            }
            _ => None,
        };
        GraphPlan {
            detach,
            attach,
            video_format,
        }
    }
}

/// Ordered set of graph mutations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphPlan {
    pub detach: Vec<Port>,
    pub attach: Vec<Port>,
    /// Format to apply to the camera once the ports are in place.
    pub video_format: Option<(Lens, VideoFormat)>,
}

impl GraphPlan {
    pub fn is_empty(&self) -> bool {
        self.detach.is_empty() && self.attach.is_empty() && self.video_format.is_none()
    }
}
