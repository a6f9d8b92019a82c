use ab_glyph::{FontVec, PxScale};
use aieyes_common::{ActivityEvent, BBox, Detection, Severity};
use chrono::{DateTime, Utc};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;
use tracing::{info, warn};

use super::FrameAnalysis;
use crate::detection::{is_bag, is_person, is_weapon};
use crate::face::MatchBand;

const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);
const ORANGE: Rgb<u8> = Rgb([255, 165, 0]);
const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);
const GRAY: Rgb<u8> = Rgb([128, 128, 128]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

const BANNER_HEIGHT: u32 = 22;
const BANNER_WIDTH: u32 = 420;

/// Draws detections, faces and activity banners. Text needs a TrueType font.
pub struct Annotator {
    font: Option<FontVec>,
}

impl Annotator {
    pub fn new(font: Option<FontVec>) -> Self {
        Self { font }
    }

    pub fn load(path: Option<&Path>) -> Self {
        let font = path.and_then(|path| match std::fs::read(path) {
            Ok(bytes) => match FontVec::try_from_vec(bytes) {
                Ok(font) => {
                    info!("Loaded overlay font {}", path.display());
                    Some(font)
                }
                Err(e) => {
                    warn!("Invalid font {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                warn!("Cannot read font {}: {}", path.display(), e);
                None
            }
        });
        Self::new(font)
    }

    pub fn render(
        &self,
        frame: &RgbImage,
        camera_id: &str,
        analysis: &FrameAnalysis,
        timestamp: DateTime<Utc>,
    ) -> RgbImage {
        let mut canvas = frame.clone();
        if canvas.width() == 0 || canvas.height() == 0 {
            return canvas;
        }

        for detection in &analysis.detections {
            let color = detection_color(detection);
            draw_box(&mut canvas, &detection.bbox, color);
            let label = format!("{} {:.2}", detection.class_name, detection.confidence);
            self.label(&mut canvas, &detection.bbox, &label, color);
        }

        for face in &analysis.faces {
            let color = match face.result.band {
                MatchBand::Authorized => GREEN,
                MatchBand::Uncertain => YELLOW,
                MatchBand::Intruder => RED,
                MatchBand::Rejected => GRAY,
            };
            draw_box(&mut canvas, &face.bbox, color);
            let label = format!("{} ({:.0}%)", face.result.name, face.result.confidence);
            self.label(&mut canvas, &face.bbox, &label, color);
        }

        for (i, activity) in analysis.activities.iter().enumerate() {
            let y = 30 + i as u32 * (BANNER_HEIGHT + 4);
            if y + BANNER_HEIGHT > canvas.height() {
                break;
            }
            let width = BANNER_WIDTH.min(canvas.width());
            draw_filled_rect_mut(
                &mut canvas,
                Rect::at(0, y as i32).of_size(width, BANNER_HEIGHT),
                severity_color(activity.severity),
            );
            if let Some(font) = &self.font {
                draw_text_mut(
                    &mut canvas,
                    BLACK,
                    4,
                    y as i32 + 3,
                    PxScale::from(16.0),
                    font,
                    &banner_text(activity),
                );
            }
        }

        if let Some(font) = &self.font {
            let info = format!(
                "{} | Objects: {} | {}",
                camera_id,
                analysis.detections.len(),
                timestamp.format("%H:%M:%S")
            );
            draw_text_mut(&mut canvas, WHITE, 6, 6, PxScale::from(18.0), font, &info);
        }

        canvas
    }

    fn label(&self, canvas: &mut RgbImage, bbox: &BBox, text: &str, color: Rgb<u8>) {
        if let Some(font) = &self.font {
            let y = (bbox.y1 - 18.0).max(0.0) as i32;
            draw_text_mut(canvas, color, bbox.x1.max(0.0) as i32, y, PxScale::from(16.0), font, text);
        }
    }
}

pub fn detection_color(detection: &Detection) -> Rgb<u8> {
    if is_weapon(detection) {
        RED
    } else if is_person(detection) {
        GREEN
    } else if is_bag(detection) {
        ORANGE
    } else {
        YELLOW
    }
}

pub fn severity_color(severity: Severity) -> Rgb<u8> {
    match severity {
        Severity::Critical => RED,
        Severity::High | Severity::Medium => ORANGE,
        Severity::Low => YELLOW,
    }
}

pub fn banner_text(activity: &ActivityEvent) -> String {
    let prefix = match activity.severity {
        Severity::Critical => "CRITICAL",
        Severity::High | Severity::Medium => "ALERT",
        Severity::Low => "INFO",
    };
    format!("{}: {}", prefix, activity.description)
}

fn draw_box(canvas: &mut RgbImage, bbox: &BBox, color: Rgb<u8>) {
    if !bbox.is_valid() {
        return;
    }
    let x = bbox.x1.round() as i32;
    let y = bbox.y1.round() as i32;
    let w = (bbox.width().round() as u32).max(1);
    let h = (bbox.height().round() as u32).max(1);
    draw_hollow_rect_mut(canvas, Rect::at(x, y).of_size(w, h), color);
    if w > 2 && h > 2 {
        draw_hollow_rect_mut(canvas, Rect::at(x + 1, y + 1).of_size(w - 2, h - 2), color);
    }
}
