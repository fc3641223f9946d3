// Integration tests for frame drawing against a recording surface

mod common;

use common::{DrawOp, RecordingSurface};
use periph_diag::render::{Display, FrameRenderer, Rgba};
use periph_diag::AnalysisFrame;

#[test]
fn test_draw_order_background_waveform_bars() {
    let (surface, ops) = RecordingSurface::new(320, 100);
    let mut display = Display::new(Box::new(surface));

    let mut frequency_domain = vec![0u8; 64];
    frequency_domain[2] = 255;
    frequency_domain[40] = 255; // above the lowest quarter, never drawn
    let frame = AnalysisFrame {
        time_domain: vec![128; 256],
        frequency_domain,
        loudness_percent: 12,
    };

    display.draw(&FrameRenderer::default(), &frame);

    let ops = ops.lock().unwrap().clone();
    assert_eq!(ops.len(), 3);
    assert_eq!(ops[0], DrawOp::Fill(Rgba::new(0, 0, 0, 255)));
    assert_eq!(ops[1], DrawOp::Polyline(257));
    match &ops[2] {
        DrawOp::Rect { x, height, .. } => {
            assert!((x - 2.0 * 12.5).abs() < 1e-4);
            assert!((height - 80.0).abs() < 1e-4);
        }
        other => panic!("expected a bar, got {:?}", other),
    }
    assert_eq!(display.meter().text(), "12%");
}

#[test]
fn test_clear_blanks_surface_and_meter() {
    let (surface, ops) = RecordingSurface::new(10, 10);
    let mut display = Display::new(Box::new(surface));
    let frame = AnalysisFrame {
        time_domain: vec![255; 16],
        frequency_domain: vec![0; 8],
        loudness_percent: 100,
    };

    display.draw(&FrameRenderer::default(), &frame);
    display.clear();

    assert_eq!(ops.lock().unwrap().last(), Some(&DrawOp::Fill(Rgba::TRANSPARENT)));
    assert_eq!(display.meter().percent(), 0);
    assert!(display.surface().encode_png().is_err());
}
