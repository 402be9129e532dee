//! End-to-end viewer tests against a real GPU adapter.
//!
//! Machines without a usable adapter (headless CI) skip these rather than
//! fail: the no-adapter path is the InitializationError contract, which is
//! asserted where it occurs.

use avatarview::customize::Customization;
use avatarview::error::{AvatarViewError, ExportError, InitError};
use avatarview::pose::{Landmark, LEFT_EYE_OUTER, NOSE_TIP, RIGHT_EYE_OUTER};
use avatarview::{Viewer, ViewerConfig};
use image::codecs::png::PngEncoder;
use image::ImageEncoder;

async fn try_viewer(width: u32, height: u32) -> Option<Viewer> {
    match Viewer::initialize(ViewerConfig::default(), width, height).await {
        Ok(viewer) => Some(viewer),
        Err(AvatarViewError::Init(InitError::NoAdapter)) => {
            eprintln!("skipping: no GPU adapter available");
            None
        }
        Err(e) => panic!("viewer initialization failed: {e}"),
    }
}

fn tiny_png() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(8, 8, image::Rgba([180, 120, 90, 255]));
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(img.as_raw(), 8, 8, image::ExtendedColorType::Rgba8)
        .unwrap();
    bytes
}

fn landmark_set() -> Vec<Landmark> {
    let mut set = vec![Landmark::default(); RIGHT_EYE_OUTER + 1];
    set[LEFT_EYE_OUTER] = Landmark { x: 0.30, y: 0.40, z: 0.0 };
    set[RIGHT_EYE_OUTER] = Landmark { x: 0.70, y: 0.40, z: 0.0 };
    set[NOSE_TIP] = Landmark { x: 0.55, y: 0.50, z: 0.0 };
    set
}

#[tokio::test]
async fn test_zero_size_mount_is_init_error() {
    let result = Viewer::initialize(ViewerConfig::default(), 0, 600).await;
    assert!(matches!(
        result,
        Err(AvatarViewError::Init(InitError::SurfaceSize { .. }))
    ));
}

#[tokio::test]
async fn test_export_lifecycle_and_resize() {
    let Some(mut viewer) = try_viewer(800, 600).await else {
        return;
    };

    // export before any frame is a hard error, not a blank image
    assert!(matches!(
        viewer.export_frame(),
        Err(AvatarViewError::Export(ExportError::NotReady))
    ));

    viewer.render_once();
    let png = viewer.export_frame().expect("export after first frame");
    assert!(!png.is_empty());
    let decoded = image::load_from_memory(&png).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (800, 600));

    // resize updates output dimensions and aspect exactly, repeat calls are
    // idempotent, and geometry is untouched
    let live_before = viewer.live_resources();
    viewer.resize(400, 300);
    viewer.resize(400, 300);
    assert_eq!(viewer.output_size(), (400, 300));
    assert_eq!(viewer.aspect(), 400.0 / 300.0);
    // old targets retired, new ones registered, geometry buffers untouched
    assert_eq!(viewer.live_resources(), live_before);

    viewer.render_once();
    let png = viewer.export_frame().unwrap();
    let decoded = image::load_from_memory(&png).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (400, 300));

    // live inputs all land without disturbing the loop
    let mut custom = Customization::default();
    custom.skin_tone = "#ff4040".parse().unwrap();
    viewer.apply_customization(custom);
    viewer.apply_landmark_set(Some(&landmark_set()));
    viewer.apply_image_blocking(&tiny_png()).unwrap();
    viewer.render_once();

    assert_eq!(viewer.dispose(), 0, "GPU resources leaked");
}

#[tokio::test]
async fn test_decode_failure_preserves_scene() {
    let Some(mut viewer) = try_viewer(320, 240).await else {
        return;
    };

    viewer.apply_image_blocking(&tiny_png()).unwrap();
    viewer.render_once();
    let before = viewer.export_frame().unwrap();

    // a bad capture is reported and changes nothing
    assert!(matches!(
        viewer.apply_image_blocking(b"not an image"),
        Err(AvatarViewError::Texture(_))
    ));
    viewer.render_once();
    let after = viewer.export_frame().unwrap();
    assert_eq!(before, after);

    assert_eq!(viewer.dispose(), 0);
}

#[tokio::test]
async fn test_repeated_texture_replacement_does_not_leak() {
    let Some(mut viewer) = try_viewer(320, 240).await else {
        return;
    };

    let baseline = viewer.live_resources();
    for _ in 0..5 {
        viewer.apply_image_blocking(&tiny_png()).unwrap();
        viewer.render_once();
    }
    // one bound texture live, every superseded one retired
    assert_eq!(viewer.live_resources(), baseline + 1);

    assert_eq!(viewer.dispose(), 0);
}

#[tokio::test]
async fn test_spawned_loop_commands_and_teardown() {
    let Some(viewer) = try_viewer(320, 240).await else {
        return;
    };
    let (handle, join) = viewer.spawn();

    handle.apply_config(Customization::default()).await.unwrap();
    handle.apply_landmarks(Some(landmark_set())).await.unwrap();
    handle.apply_image(tiny_png()).await.unwrap();
    handle.orbit(0.2, -0.1).await.unwrap();
    handle.zoom(0.8).await.unwrap();
    handle.resize(160, 120).await.unwrap();

    // let a few frames tick so export sees rendered content
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let png = handle.export_png().await.unwrap();
    assert!(!png.is_empty());
    let decoded = image::load_from_memory(&png).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (160, 120));

    // teardown acknowledges only after disposal, so the loop must be at its
    // end by the time the await resolves
    handle.teardown().await.unwrap();
    let run_result = tokio::time::timeout(std::time::Duration::from_secs(5), join)
        .await
        .expect("viewer loop still running after teardown acknowledged")
        .unwrap();
    assert!(run_result.is_ok(), "clean teardown reported a device loss");

    // the torn-down viewer accepts no further commands
    assert!(handle.apply_config(Customization::default()).await.is_err());
    assert!(handle.export_png().await.is_err());
}
