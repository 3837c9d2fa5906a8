//! Combines trace and drill layers into a single exposure mask.

use crate::artwork::{Bounds, Layer};

use super::canvas::{LayerCanvas, RenderSettings};
use super::frame::{Ink, RasterFrame};

/// Renders a board: black copper on white, drill holes punched back to white.
///
/// Both layers share one coordinate frame, so holes land on their pads even
/// when the drill file extends past the copper.
#[derive(Debug, Clone, Copy)]
pub struct LayerCompositor {
    scale: f64,
}

impl LayerCompositor {
    pub fn new(scale: f64) -> Self {
        Self { scale }
    }

    pub fn render(&self, traces: &Layer, drills: Option<&Layer>) -> RasterFrame {
        let mut canvas = LayerCanvas::new(self.scale);

        let bounds = Bounds::union(traces.bounds(), drills.and_then(Layer::bounds));
        if let Some(bounds) = bounds {
            canvas.bind(bounds);
        }

        canvas.render(
            traces,
            RenderSettings {
                foreground: Ink::Black,
                background: Some(Ink::White),
            },
        );
        if let Some(drills) = drills {
            log::debug!("punching {} drill primitives", drills.primitives().len());
            canvas.render(
                drills,
                RenderSettings {
                    foreground: Ink::White,
                    background: None,
                },
            );
        }

        canvas.into_frame()
    }
}
