//! Muxer stage driven from concurrent producers

use remotemedia_frame_muxer::{
    FrameMuxer, MuxerConfig, MuxerInput, MuxerStage, PixelFormat, StageEvent, StreamItem,
    VideoFormat, VideoFrame,
};

fn frame(pts: i64) -> VideoFrame {
    VideoFrame::new(1920, 1080, PixelFormat::Bgra32, vec![0u8; 4]).with_pts(pts)
}

#[tokio::test]
async fn test_separate_audio_and_video_producers() {
    let config = MuxerConfig {
        input_fps: 25.0,
        format: VideoFormat::X1080p2500,
        ..MuxerConfig::default()
    };
    let mut stage = MuxerStage::spawn(FrameMuxer::from_config(&config).unwrap(), 16);

    let video_tx = stage.sender();
    let audio_tx = stage.sender();

    let video = tokio::spawn(async move {
        for pts in 0..10 {
            video_tx.send(MuxerInput::Video(frame(pts).into())).await.unwrap();
        }
    });
    let audio = tokio::spawn(async move {
        for _ in 0..10 {
            audio_tx.send(MuxerInput::Audio(vec![0; 3840].into())).await.unwrap();
        }
    });

    let mut pts = Vec::new();
    while pts.len() < 10 {
        match stage.recv().await {
            Some(StageEvent::Frame(out)) => pts.extend(out.pts()),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    video.await.unwrap();
    audio.await.unwrap();

    assert_eq!(pts, (0..10).map(Some).collect::<Vec<_>>());

    let report = stage.finish().await.unwrap();
    assert!(report.remaining.is_empty());
    assert_eq!(report.stats.frames_out, 10);
    assert_eq!(report.stats.audio_samples_in, 10 * 3840);
}

#[tokio::test]
async fn test_flush_markers_pass_through_stage() {
    let format = VideoFormat::X1080i5994.desc();
    let mut stage = MuxerStage::spawn(FrameMuxer::new(59.94, format, "").unwrap(), 16);

    stage.push_video(frame(1).into()).await.unwrap();
    stage.push_audio(vec![0; 3203].into()).await.unwrap();
    stage.push_video(StreamItem::Flush).await.unwrap();
    stage.push_audio(StreamItem::Flush).await.unwrap();

    stage.push_video(frame(2).into()).await.unwrap();
    stage.push_video(frame(3).into()).await.unwrap();
    stage.push_audio(vec![0; 3204].into()).await.unwrap();

    match stage.recv().await {
        Some(StageEvent::Frame(out)) => assert_eq!(out.pts(), vec![Some(2), Some(3)]),
        other => panic!("unexpected event: {:?}", other),
    }

    let report = stage.finish().await.unwrap();
    assert_eq!(report.stats.truncations, 1);
    assert_eq!(report.stats.truncated_audio_samples, 3203);
}

#[tokio::test]
async fn test_overflow_ends_stage() {
    let mut stage = MuxerStage::spawn(FrameMuxer::new(25.0, VideoFormat::X1080p2500.desc(), "").unwrap(), 64);

    for pts in 0..33 {
        stage.push_video(frame(pts).into()).await.unwrap();
    }

    match stage.recv().await {
        Some(StageEvent::Error(e)) => assert!(e.is_overflow()),
        other => panic!("unexpected event: {:?}", other),
    }

    let report = stage.finish().await.unwrap();
    assert!(report.remaining.is_empty());
    assert_eq!(report.stats.video_frames_in, 33);
    assert_eq!(report.stats.frames_out, 0);
}
