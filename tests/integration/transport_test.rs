//! Remote Transport Integration Tests
//!
//! Runs the engine against a minimal streaming HTTP server: frame
//! reassembly across arbitrary chunk boundaries, malformed-record skipping,
//! early closes and stalls reported as incomplete streams, in-band error
//! frames, and the simulated fallback when the server cannot be reached.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use sop_pilot::{
    ChatContext, ChatResponse, EngineConfig, Frame, ModelInfo, PipelineError, ReasoningEngine,
    ReasoningResult, ReasoningStep, Recommendation, RecommendedAction, Resolution, StageRole,
    WorkItem, STRATEGY,
};
use sop_pilot_core::EmptyProcedureSource;

// ============================================================================
// Stub streaming server
// ============================================================================

const STREAM_HEAD: &[u8] =
    b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n";

/// Serves exactly one connection: consumes the request, writes `chunks` in
/// order with a small delay between writes, then optionally holds the socket
/// open before closing. Returns the base URL to point the engine at.
async fn spawn_server(chunks: Vec<Vec<u8>>, hold_open: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/", listener.local_addr().unwrap());
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            read_request(&mut socket).await;
            for chunk in chunks {
                if socket.write_all(&chunk).await.is_err() {
                    return;
                }
                let _ = socket.flush().await;
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            if !hold_open.is_zero() {
                tokio::time::sleep(hold_open).await;
            }
        }
    });
    base
}

/// Reads the request head plus its content-length body so the client never
/// sees a reset while still sending.
async fn read_request(socket: &mut TcpStream) {
    let mut buf = [0u8; 4096];
    let mut seen = Vec::new();
    loop {
        let n = match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        seen.extend_from_slice(&buf[..n]);
        if let Some(head_end) = seen.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&seen[..head_end]);
            let content_length = head
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    if name.eq_ignore_ascii_case("content-length") {
                        value.trim().parse::<usize>().ok()
                    } else {
                        None
                    }
                })
                .unwrap_or(0);
            let mut remaining = content_length.saturating_sub(seen.len() - (head_end + 4));
            while remaining > 0 {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => remaining = remaining.saturating_sub(n),
                }
            }
            return;
        }
    }
}

fn wire(frames: &[Frame]) -> Vec<u8> {
    frames
        .iter()
        .map(|f| f.encode().unwrap())
        .collect::<String>()
        .into_bytes()
}

fn split_every(bytes: &[u8], n: usize) -> Vec<Vec<u8>> {
    bytes.chunks(n).map(|c| c.to_vec()).collect()
}

// ============================================================================
// Fixtures
// ============================================================================

fn canned_result() -> ReasoningResult {
    let steps = vec![
        ReasoningStep::new(StageRole::Analysis, "Reviewed the item record", 0.9),
        ReasoningStep::new(StageRole::ProcedureMatching, "Matched SOP 3.1", 0.85)
            .with_procedures(vec!["SOP 3.1".to_string()]),
        ReasoningStep::new(StageRole::RiskAssessment, "Risk acceptable", 0.88),
        ReasoningStep::new(
            StageRole::Recommendation,
            "Process following SOP 3.1",
            0.87,
        ),
    ];
    ReasoningResult {
        run_id: "run-remote-1".to_string(),
        item: WorkItem::new("RM-1", "Pending Review"),
        steps,
        recommendation: Some(Recommendation {
            action: RecommendedAction::Process,
            text: "Process following SOP 3.1".to_string(),
            timeline: "48 hours".to_string(),
            procedure_refs: vec!["SOP 3.1".to_string()],
            confidence: 0.87,
        }),
        resolution: Resolution::NoEscalation,
        model_info: Some(ModelInfo::new("gpt-4o-mini", STRATEGY)),
        degraded: false,
        simulated: false,
        started_at: None,
        completed_at: None,
    }
}

fn analyze_frames(result: &ReasoningResult) -> Vec<Frame> {
    let mut frames = vec![Frame::Connection {
        message: Some("Reasoning run started".to_string()),
        model: Some("gpt-4o-mini".to_string()),
    }];
    frames.extend(result.steps.iter().cloned().map(|step| Frame::Step { step }));
    frames.push(Frame::Complete {
        result: serde_json::to_value(result).unwrap(),
    });
    frames.push(Frame::End);
    frames
}

fn remote_engine(base: &str, idle_timeout_ms: u64) -> ReasoningEngine {
    ReasoningEngine::new(
        EngineConfig::remote(base).with_idle_timeout_ms(idle_timeout_ms),
        Arc::new(EmptyProcedureSource),
    )
    .unwrap()
}

// ============================================================================
// Frame reassembly
// ============================================================================

#[tokio::test]
async fn test_remote_run_reassembles_frames_split_at_arbitrary_offsets() {
    let expected = canned_result();
    let payload = wire(&analyze_frames(&expected));
    // Head first, then the frame bytes split mid-record.
    let mut chunks = vec![STREAM_HEAD.to_vec()];
    chunks.extend(split_every(&payload, 7));
    let base = spawn_server(chunks, Duration::ZERO).await;

    let engine = remote_engine(&base, 5_000);
    let mut observed = Vec::new();
    let result = engine
        .run_with(WorkItem::new("RM-1", "Pending Review"), |step| {
            observed.push(step.role);
        })
        .await
        .unwrap();

    assert_eq!(observed, StageRole::ALL.to_vec());
    assert_eq!(result.run_id, expected.run_id);
    assert_eq!(result.steps.len(), 4);
    assert_eq!(
        result.recommendation.as_ref().map(|r| r.action),
        Some(RecommendedAction::Process)
    );
    assert!(!result.simulated);
}

#[tokio::test]
async fn test_malformed_records_are_skipped() {
    let expected = canned_result();
    let mut payload = Vec::new();
    let frames = analyze_frames(&expected);
    for (idx, frame) in frames.iter().enumerate() {
        payload.extend_from_slice(frame.encode().unwrap().as_bytes());
        if idx == 1 {
            payload.extend_from_slice(b"data: {broken json\n");
            payload.extend_from_slice(b"data: {\"type\":\"heartbeat\"}\n");
        }
    }
    let base = spawn_server(vec![STREAM_HEAD.to_vec(), payload], Duration::ZERO).await;

    let result = remote_engine(&base, 5_000)
        .run(WorkItem::new("RM-1", "Pending Review"))
        .await
        .unwrap();
    assert_eq!(result.steps.len(), 4);
}

// ============================================================================
// Incomplete streams
// ============================================================================

#[tokio::test]
async fn test_close_before_terminal_frame_is_incomplete() {
    let expected = canned_result();
    // Connection plus two steps, then the server closes.
    let partial = wire(&analyze_frames(&expected)[..3]);
    let base = spawn_server(vec![STREAM_HEAD.to_vec(), partial], Duration::ZERO).await;

    let engine = remote_engine(&base, 5_000);
    let mut steps_seen = 0;
    let err = engine
        .run_with(WorkItem::new("RM-1", "Pending Review"), |_| steps_seen += 1)
        .await
        .unwrap_err();

    assert!(err.is_stream_incomplete(), "got {:?}", err);
    assert_eq!(steps_seen, 2);
}

#[tokio::test]
async fn test_stalled_stream_times_out_as_incomplete() {
    let expected = canned_result();
    let first = wire(&analyze_frames(&expected)[..2]);
    // One write, then the socket goes quiet far longer than the idle budget.
    let base = spawn_server(
        vec![STREAM_HEAD.to_vec(), first],
        Duration::from_secs(60),
    )
    .await;

    let err = remote_engine(&base, 150)
        .run(WorkItem::new("RM-1", "Pending Review"))
        .await
        .unwrap_err();
    assert!(err.is_stream_incomplete(), "got {:?}", err);
}

#[tokio::test]
async fn test_error_frame_surfaces_as_transport_error() {
    let frames = vec![
        Frame::Connection {
            message: None,
            model: None,
        },
        Frame::Error {
            message: "backend exploded".to_string(),
        },
    ];
    let base = spawn_server(vec![STREAM_HEAD.to_vec(), wire(&frames)], Duration::ZERO).await;

    let err = remote_engine(&base, 5_000)
        .run(WorkItem::new("RM-1", "Pending Review"))
        .await
        .unwrap_err();
    match err {
        PipelineError::Transport(message) => assert!(message.contains("backend exploded")),
        other => panic!("expected transport error, got {:?}", other),
    }
}

// ============================================================================
// Simulated fallback
// ============================================================================

#[tokio::test]
async fn test_unreachable_server_falls_back_to_simulated_run() {
    // Bind then drop so the port is known-dead.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/", listener.local_addr().unwrap());
    drop(listener);

    let result = remote_engine(&base, 5_000)
        .run(WorkItem::new("RM-2", "Pending Review"))
        .await
        .unwrap();

    assert!(result.simulated);
    assert_eq!(result.steps.len(), 4);
    assert!(result.recommendation.is_some());
}

#[tokio::test]
async fn test_server_error_at_open_falls_back_to_simulated_run() {
    let head = b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n";
    let base = spawn_server(vec![head.to_vec()], Duration::ZERO).await;

    let result = remote_engine(&base, 5_000)
        .run(WorkItem::new("RM-3", "Pending Review"))
        .await
        .unwrap();
    assert!(result.simulated);
}

#[tokio::test]
async fn test_fallback_disabled_reports_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/", listener.local_addr().unwrap());
    drop(listener);

    let engine = ReasoningEngine::new(
        EngineConfig::remote(&base).without_simulated_fallback(),
        Arc::new(EmptyProcedureSource),
    )
    .unwrap();

    let err = engine
        .run(WorkItem::new("RM-4", "Pending Review"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Transport(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_mid_stream_break_does_not_fall_back() {
    // Fallback applies only when the stream cannot be opened; a stream that
    // breaks after opening must surface as incomplete even with the
    // fallback enabled.
    let expected = canned_result();
    let partial = wire(&analyze_frames(&expected)[..2]);
    let base = spawn_server(vec![STREAM_HEAD.to_vec(), partial], Duration::ZERO).await;

    let err = remote_engine(&base, 5_000)
        .run(WorkItem::new("RM-5", "Pending Review"))
        .await
        .unwrap_err();
    assert!(err.is_stream_incomplete());
}

// ============================================================================
// Remote chat
// ============================================================================

#[tokio::test]
async fn test_remote_chat_streams_tokens_then_resolves() {
    let response = ChatResponse {
        text: "Based on SOP 3.1, verify eligibility first.".to_string(),
        referenced_procedures: vec!["SOP 3.1".to_string()],
        suggestions: vec!["What are the next steps?".to_string()],
        simulated: false,
    };
    let frames = vec![
        Frame::Token {
            token: "Based on SOP 3.1, ".to_string(),
        },
        Frame::Token {
            token: "verify eligibility first.".to_string(),
        },
        Frame::Complete {
            result: serde_json::to_value(&response).unwrap(),
        },
        Frame::End,
    ];
    let base = spawn_server(vec![STREAM_HEAD.to_vec(), wire(&frames)], Duration::ZERO).await;

    let engine = remote_engine(&base, 5_000);
    let context = ChatContext::new(WorkItem::new("RM-1", "Pending Review"));
    let mut streamed = String::new();
    let answer = engine
        .send_with("What should happen next?", context, |token| {
            streamed.push_str(token)
        })
        .await
        .unwrap();

    assert_eq!(streamed, answer.text);
    assert_eq!(answer.referenced_procedures, vec!["SOP 3.1"]);
    assert!(!answer.simulated);
}

#[tokio::test]
async fn test_remote_chat_end_without_result_keeps_accumulated_text() {
    let frames = vec![
        Frame::Token {
            token: "Partial ".to_string(),
        },
        Frame::Token {
            token: "answer".to_string(),
        },
        Frame::End,
    ];
    let base = spawn_server(vec![STREAM_HEAD.to_vec(), wire(&frames)], Duration::ZERO).await;

    let engine = remote_engine(&base, 5_000);
    let context = ChatContext::new(WorkItem::new("RM-1", "Pending Review"));
    let answer = engine.send("Anything?", context).await.unwrap();

    assert_eq!(answer.text, "Partial answer");
    assert!(answer.referenced_procedures.is_empty());
}
