//! Driver-level tests: the ingress queue, callback dispatch, actions,
//! cancellation, and the MCCP splice, all through the public async surface.

use async_trait::async_trait;
use encoding_rs::Encoding;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_util::bytes::Bytes;

use mudwire::{Action, Driver, Engine, Role, TelnetHandler, TelnetOption};

struct TestHandler {
    lines: UnboundedSender<Bytes>,
    wire: UnboundedSender<Bytes>,
    prompts: UnboundedSender<()>,
}

#[async_trait]
impl TelnetHandler for TestHandler {
    async fn submit(
        &mut self,
        line: Bytes,
        _encoding: &'static Encoding,
        _engine: &mut Engine,
    ) -> mudwire::Result<()> {
        self.lines.send(line).ok();
        Ok(())
    }

    async fn negotiate(&mut self, bytes: Bytes) -> mudwire::Result<()> {
        self.wire.send(bytes).ok();
        Ok(())
    }

    async fn on_prompt(&mut self) {
        self.prompts.send(()).ok();
    }
}

struct Connection {
    handle: mudwire::Handle,
    task: tokio::task::JoinHandle<mudwire::Result<()>>,
    lines: UnboundedReceiver<Bytes>,
    wire: UnboundedReceiver<Bytes>,
    prompts: UnboundedReceiver<()>,
}

fn connect(engine: Engine) -> Connection {
    let (lines_tx, lines) = unbounded_channel();
    let (wire_tx, wire) = unbounded_channel();
    let (prompts_tx, prompts) = unbounded_channel();
    let handler = TestHandler {
        lines: lines_tx,
        wire: wire_tx,
        prompts: prompts_tx,
    };
    let (handle, task) = Driver::spawn(engine, Box::new(handler));
    Connection {
        handle,
        task,
        lines,
        wire,
        prompts,
    }
}

#[tokio::test]
async fn offers_precede_user_data() {
    let engine = Engine::builder(Role::Server)
        .option(TelnetOption::Gmcp)
        .build()
        .unwrap();
    let mut conn = connect(engine);

    conn.handle.feed(b"hello\r\n").await.unwrap();

    // The unsolicited WILL GMCP must arrive before anything else.
    let first = conn.wire.recv().await.unwrap();
    assert_eq!(first.as_ref(), &[0xFF, 0xFB, 0xC9]);

    let line = conn.lines.recv().await.unwrap();
    assert_eq!(line.as_ref(), b"hello");

    drop(conn.handle);
    conn.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn cancel_stops_the_task() {
    let engine = Engine::builder(Role::Server).build().unwrap();
    let conn = connect(engine);

    conn.handle.cancel();
    conn.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn disconnect_action_stops_the_task() {
    let engine = Engine::builder(Role::Server).build().unwrap();
    let conn = connect(engine);

    conn.handle.send(Action::Disconnect).unwrap();
    conn.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn send_line_action_reaches_the_wire() {
    let engine = Engine::builder(Role::Server).build().unwrap();
    let mut conn = connect(engine);

    conn.handle
        .send(Action::SendLine(Bytes::from_static(b"north")))
        .unwrap();
    let bytes = conn.wire.recv().await.unwrap();
    assert_eq!(bytes.as_ref(), b"north\r\n");

    drop(conn.handle);
    conn.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn prompt_round_trip() {
    let engine = Engine::builder(Role::Server).build().unwrap();
    let mut conn = connect(engine);

    // Inbound GA raises the prompt callback.
    conn.handle.feed(&[0xFF, 0xF9]).await.unwrap();
    conn.prompts.recv().await.unwrap();

    // Outbound prompt with nothing agreed is a GA.
    conn.handle.send(Action::Prompt).unwrap();
    let bytes = conn.wire.recv().await.unwrap();
    assert_eq!(bytes.as_ref(), &[0xFF, 0xF9]);

    drop(conn.handle);
    conn.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn mccp2_inbound_stream_is_spliced() {
    let engine = Engine::builder(Role::Client)
        .option(TelnetOption::Mccp2)
        .build()
        .unwrap();
    let mut conn = connect(engine);

    // Server offers compression; we accept.
    conn.handle.feed(&[0xFF, 0xFB, 0x56]).await.unwrap();
    let reply = conn.wire.recv().await.unwrap();
    assert_eq!(reply.as_ref(), &[0xFF, 0xFD, 0x56]);

    // The marker, then a zlib-compressed line.
    conn.handle.feed(&[0xFF, 0xFA, 0x56, 0xFF, 0xF0]).await.unwrap();

    let compressed = zlib_sync_compress(b"You awaken in darkness.\r\n");
    conn.handle.feed(&compressed).await.unwrap();

    let line = conn.lines.recv().await.unwrap();
    assert_eq!(line.as_ref(), b"You awaken in darkness.");

    drop(conn.handle);
    conn.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn mccp2_garbage_disables_compression() {
    let engine = Engine::builder(Role::Client)
        .option(TelnetOption::Mccp2)
        .build()
        .unwrap();
    let mut conn = connect(engine);

    conn.handle.feed(&[0xFF, 0xFB, 0x56]).await.unwrap();
    let _ = conn.wire.recv().await.unwrap(); // DO MCCP2
    conn.handle.feed(&[0xFF, 0xFA, 0x56, 0xFF, 0xF0]).await.unwrap();

    // Not a zlib stream: compression is dropped and refused.
    conn.handle.feed(&[0x00, 0x12, 0x34]).await.unwrap();
    let refusal = conn.wire.recv().await.unwrap();
    assert_eq!(refusal.as_ref(), &[0xFF, 0xFE, 0x56]);

    // Plain traffic flows again.
    conn.handle.feed(b"ok\r\n").await.unwrap();
    let line = conn.lines.recv().await.unwrap();
    assert_eq!(line.as_ref(), b"ok");

    drop(conn.handle);
    conn.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn mccp2_outbound_stream_is_compressed() {
    let engine = Engine::builder(Role::Server)
        .option(TelnetOption::Mccp2)
        .build()
        .unwrap();
    let mut conn = connect(engine);

    // WILL MCCP2 offer, client accepts, marker goes out uncompressed.
    let offer = conn.wire.recv().await.unwrap();
    assert_eq!(offer.as_ref(), &[0xFF, 0xFB, 0x56]);
    conn.handle.feed(&[0xFF, 0xFD, 0x56]).await.unwrap();
    let marker = conn.wire.recv().await.unwrap();
    assert_eq!(marker.as_ref(), &[0xFF, 0xFA, 0x56, 0xFF, 0xF0]);

    // Everything after the marker is zlib.
    conn.handle
        .send(Action::SendLine(Bytes::from_static(b"A dragon arrives.")))
        .unwrap();
    let compressed = conn.wire.recv().await.unwrap();
    assert_ne!(compressed.as_ref(), b"A dragon arrives.\r\n");

    let recovered = zlib_decompress(&compressed);
    assert_eq!(recovered, b"A dragon arrives.\r\n");

    drop(conn.handle);
    conn.task.await.unwrap().unwrap();
}

struct FailingHandler;

#[async_trait]
impl TelnetHandler for FailingHandler {
    async fn submit(
        &mut self,
        _line: Bytes,
        _encoding: &'static Encoding,
        _engine: &mut Engine,
    ) -> mudwire::Result<()> {
        Err(mudwire::error::ErrorKind::Internal("submit refused".to_string()).into())
    }

    async fn negotiate(&mut self, _bytes: Bytes) -> mudwire::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn submit_error_aborts_the_connection() {
    let engine = Engine::builder(Role::Server).build().unwrap();
    let (handle, task) = Driver::spawn(engine, Box::new(FailingHandler));

    handle.feed(b"boom\r\n").await.unwrap();
    assert!(task.await.unwrap().is_err());

    // The driver is gone; further feeding fails cleanly.
    assert!(handle.feed(b"more").await.is_err());
}

#[tokio::test]
async fn backpressured_feed_still_delivers_everything() {
    let engine = Engine::builder(Role::Server)
        .ingress_capacity(4)
        .build()
        .unwrap();
    let mut conn = connect(engine);

    for _ in 0..64 {
        conn.handle.feed(b"line of text\r\n").await.unwrap();
    }
    for _ in 0..64 {
        let line = conn.lines.recv().await.unwrap();
        assert_eq!(line.as_ref(), b"line of text");
    }

    drop(conn.handle);
    conn.task.await.unwrap().unwrap();
}

/// Compress with a sync flush so the decoder can recover the input without
/// seeing end-of-stream, the way MCCP servers write.
fn zlib_sync_compress(input: &[u8]) -> Vec<u8> {
    use flate2::{Compress, Compression, FlushCompress};

    let mut compressor = Compress::new(Compression::default(), true);
    let mut out = vec![0u8; input.len() * 2 + 256];
    compressor
        .compress(input, &mut out, FlushCompress::Sync)
        .unwrap();
    let produced = usize::try_from(compressor.total_out()).unwrap();
    out.truncate(produced);
    out
}

fn zlib_decompress(input: &[u8]) -> Vec<u8> {
    use flate2::{Decompress, FlushDecompress};

    let mut decompressor = Decompress::new(true);
    let mut out = vec![0u8; input.len() * 16 + 1024];
    decompressor
        .decompress(input, &mut out, FlushDecompress::None)
        .unwrap();
    let produced = usize::try_from(decompressor.total_out()).unwrap();
    out.truncate(produced);
    out
}
