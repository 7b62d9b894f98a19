//! The embeddable voice engine: owns per-speaker codec/jitter state, the
//! capture ring, and the bounded event/outgoing queues, and drives them
//! through `connect`/`submit_capture_pcm`/`ingest_packet`/`tick`/`poll_*`.
//!
//! Grounded on the reference engine's single `struct rv_voice` plus its
//! `rv_voice_*` functions: same allocate-with-rollback constructor, same
//! two-slot rotating message buffer for `Log`/`Error` events, same per-tick
//! order (drain capture, encode+queue; then per speaker: timeout check,
//! jitter pop, decode, emit).

use std::sync::Mutex;

use crate::capture_ring::{self, CaptureConsumer, CaptureProducer, MAX_CAPTURE_SAMPLES};
use crate::error::VoiceError;
use crate::event_queue::{Event, EventQueue, PcmFrameEvent};
use crate::jitter::OpusJitterBuffer;
use crate::opus_codec::{OpusCodecConfig, OpusDecoderAdapter, OpusEncoderAdapter};
use crate::outgoing::OutgoingQueue;
use crate::wire;
use crate::{
    version_compatible, ConnectInfo, LogLevel, MixResult, PlayerState, VoiceConfig, VoiceEvent, VoiceLogCallback,
};

const SPEAKING_TIMEOUT_MS: u64 = 250;
const MSG_SLOT_LEN: usize = 256;

struct Speaker {
    decoder: OpusDecoderAdapter,
    jitter: OpusJitterBuffer,
    pcm_buf: Vec<i16>,
    pcm_count: usize,
    speaking: bool,
    last_rx_ms: u64,
    last_rx_flags: u8,
}

struct Shared {
    cfg: VoiceConfig,
    connected: bool,
    session_id: u64,
    player_id: u16,
    frame_samples: usize,

    encoder: OpusEncoderAdapter,
    speakers: Vec<Speaker>,

    local_state: Option<PlayerState>,

    seq: u16,
    out_q: OutgoingQueue,
    evq: EventQueue,

    msg_buf: [[u8; MSG_SLOT_LEN]; 2],
    msg_flip: u32,

    capture_rx: CaptureConsumer,
    log_callback: Option<Box<dyn VoiceLogCallback>>,
}

impl Shared {
    fn next_msg_slot(&mut self) -> usize {
        let idx = (self.msg_flip & 1) as usize;
        self.msg_flip = self.msg_flip.wrapping_add(1);
        idx
    }

    fn write_msg(&mut self, slot: usize, msg: &str) {
        let bytes = msg.as_bytes();
        let n = bytes.len().min(MSG_SLOT_LEN - 1);
        self.msg_buf[slot][..n].copy_from_slice(&bytes[..n]);
        self.msg_buf[slot][n] = 0;
    }

    fn msg_str(&self, slot: usize) -> String {
        let buf = &self.msg_buf[slot];
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        String::from_utf8_lossy(&buf[..end]).into_owned()
    }

    fn emit_log(&mut self, level: LogLevel, msg: &str) {
        match level {
            LogLevel::Info => log::info!("{msg}"),
            LogLevel::Warn => log::warn!("{msg}"),
            LogLevel::Error => log::error!("{msg}"),
        }
        if let Some(cb) = &self.log_callback {
            cb.on_log(level, msg.to_string());
        }
        let slot = self.next_msg_slot();
        self.write_msg(slot, msg);
        self.evq.push(Event::Log { level, msg_slot: slot });
    }

    fn emit_error(&mut self, code: VoiceError, msg: &str) {
        log::error!("{msg}");
        if let Some(cb) = &self.log_callback {
            cb.on_log(LogLevel::Error, msg.to_string());
        }
        let slot = self.next_msg_slot();
        self.write_msg(slot, msg);
        self.evq.push(Event::Error { code, msg_slot: slot });
    }

    /// Before the host has ever called `set_local_state`, falls back to a
    /// default `PlayerState` (ptt up, radio off) — the same no-transmit-until-
    /// PTT / transmit-by-default-in-proximity behavior the default state's
    /// fields would produce, without a separate "no state yet" branch.
    fn capture_should_transmit(&self) -> bool {
        let state = self.local_state.unwrap_or_default();
        crate::policy::should_transmit(self.cfg.capture_mode, &state)
    }

    fn tx_flags(&self) -> u8 {
        let state = self.local_state.unwrap_or_default();
        crate::policy::build_flags(&state)
    }

    fn encode_and_queue_voice(&mut self, samples: &[i16]) {
        if !self.capture_should_transmit() {
            return;
        }

        let mut opus_buf = [0u8; crate::jitter::MAX_OPUS_PACKET];
        let olen = match self.encoder.encode(samples, &mut opus_buf) {
            Ok(n) => n,
            Err(_) => {
                self.emit_error(VoiceError::Internal, "opus encode failed");
                return;
            }
        };

        let flags = self.tx_flags();
        let seq = self.seq;
        self.seq = self.seq.wrapping_add(1);

        let Some(pkt) = wire::build_voice_packet(self.player_id, seq, flags, &opus_buf[..olen]) else {
            self.emit_error(VoiceError::Internal, "build voice packet failed");
            return;
        };

        if !self.out_q.push(&pkt) {
            self.emit_log(LogLevel::Warn, "outgoing queue full (dropping voice)");
        }
    }
}

/// The embeddable voice engine. Exposed to hosts as a `uniffi::Object`: all
/// methods take `&self`, mutable state lives behind a single mutex except
/// the lock-free capture producer.
#[derive(uniffi::Object)]
pub struct VoiceEngine {
    capture_tx: CaptureProducer,
    inner: Mutex<Shared>,
}

// `CaptureProducer` is `!Sync` by design (see capture_ring.rs) so that a
// pure-Rust caller holding one directly is compile-time restricted to a
// single producer thread. `uniffi::Object` types are always handed out as
// `Arc<Self>`, which requires `Sync`; wrapping in `VoiceEngine` turns the
// single-producer rule from a compiler-checked invariant into a documented
// host contract instead, matching the original API's own
// "intended for audio callback thread (single producer)" comment on
// `submit_capture_pcm_async` — that contract was never compiler-enforced
// there either, once exposed across a C ABI. Callers that invoke
// `submit_capture_pcm[_async]` concurrently from more than one thread break
// this contract; `CaptureProducer::push`'s internal unsafe block assumes it.
unsafe impl Sync for VoiceEngine {}

#[uniffi::export]
impl VoiceEngine {
    /// Validates `cfg.api_version`, allocates per-speaker state up front, and
    /// never hands back a partially-initialized engine. `log_callback` is
    /// optional: hosts that only poll `Log`/`Error` events via `poll_event`
    /// can pass `None`.
    #[uniffi::constructor]
    pub fn new(cfg: VoiceConfig, log_callback: Option<Box<dyn VoiceLogCallback>>) -> Result<Self, VoiceError> {
        if !version_compatible(cfg.api_version) {
            return Err(VoiceError::InvalidArgument);
        }
        if cfg.max_players == 0 {
            return Err(VoiceError::InvalidArgument);
        }

        let frame_samples = (cfg.sample_rate_hz as usize * cfg.frame_ms as usize) / 1000;
        if frame_samples == 0 || frame_samples > MAX_CAPTURE_SAMPLES {
            return Err(VoiceError::InvalidArgument);
        }

        let codec_cfg = OpusCodecConfig {
            sample_rate_hz: cfg.sample_rate_hz,
            frame_samples,
        };

        let encoder = OpusEncoderAdapter::new(&codec_cfg)?;

        let mut speakers = Vec::with_capacity(cfg.max_players as usize);
        for _ in 0..cfg.max_players {
            let decoder = OpusDecoderAdapter::new(&codec_cfg)?;
            speakers.push(Speaker {
                decoder,
                jitter: OpusJitterBuffer::new(),
                pcm_buf: vec![0i16; frame_samples],
                pcm_count: 0,
                speaking: false,
                last_rx_ms: 0,
                last_rx_flags: 0,
            });
        }

        let (capture_tx, capture_rx) = capture_ring::channel();

        let mut shared = Shared {
            cfg,
            connected: false,
            session_id: 0,
            player_id: 0,
            frame_samples,
            encoder,
            speakers,
            local_state: None,
            seq: 0,
            out_q: OutgoingQueue::new(),
            evq: EventQueue::new(),
            msg_buf: [[0u8; MSG_SLOT_LEN]; 2],
            msg_flip: 0,
            capture_rx,
            log_callback,
        };
        shared.emit_log(LogLevel::Info, "voice engine initialized");

        Ok(Self {
            capture_tx,
            inner: Mutex::new(shared),
        })
    }

    /// Sends a JOIN packet and marks the session connected.
    pub fn connect(&self, info: ConnectInfo) -> Result<(), VoiceError> {
        let mut s = self.inner.lock().unwrap();
        s.session_id = info.session_id;
        s.player_id = info.local_player_id;

        let pkt = wire::build_join_packet(info.session_id, info.local_player_id);
        if !s.out_q.push(&pkt) {
            s.emit_error(VoiceError::Internal, "connect: outgoing queue full");
            return Err(VoiceError::Internal);
        }

        s.connected = true;
        s.evq.push(Event::Connected);
        Ok(())
    }

    pub fn disconnect(&self) {
        let mut s = self.inner.lock().unwrap();
        s.connected = false;
        s.evq.push(Event::Disconnected);
    }

    /// Updates the local player's transmit-affecting state, consulted by
    /// `capture_should_transmit` on the next tick.
    pub fn set_local_state(&self, state: PlayerState) {
        let mut s = self.inner.lock().unwrap();
        s.local_state = Some(state);
    }

    /// Realtime-safe capture submit: pushes into the lock-free SPSC ring,
    /// callable from an audio callback thread without ever touching the
    /// engine mutex. Must be called from a single producer thread — calling
    /// it concurrently from more than one thread is a caller error, not
    /// something this type can reject at runtime.
    pub fn submit_capture_pcm_async(&self, samples: Vec<i16>) -> Result<(), VoiceError> {
        if samples.is_empty() {
            return Err(VoiceError::InvalidArgument);
        }
        let frame_samples = {
            let s = self.inner.lock().unwrap();
            if !s.connected {
                return Err(VoiceError::NotConnected);
            }
            s.frame_samples
        };
        if samples.len() != frame_samples {
            return Err(VoiceError::InvalidArgument);
        }
        self.capture_tx.push(&samples);
        Ok(())
    }

    /// Equivalent to `submit_capture_pcm_async`: both route through the same
    /// ring so capture timing behaves identically regardless of call site.
    pub fn submit_capture_pcm(&self, samples: Vec<i16>) -> Result<(), VoiceError> {
        self.submit_capture_pcm_async(samples)
    }

    /// Parses and routes one inbound datagram. Malformed packets, JOIN
    /// packets, and out-of-range speaker ids are silently ignored — this
    /// engine is receive-only for VOICE traffic. `now_ms` is the host's
    /// monotonically non-decreasing clock; the engine keeps no clock of its
    /// own.
    pub fn ingest_packet(&self, data: Vec<u8>, now_ms: u64) {
        let mut s = self.inner.lock().unwrap();
        let Some((speaker_id, seq, flags, payload)) = wire::parse_voice_packet(&data) else {
            return;
        };
        if speaker_id == 0 || speaker_id as usize > s.cfg.max_players as usize {
            return;
        }
        let idx = (speaker_id - 1) as usize;

        let sp = &mut s.speakers[idx];
        sp.last_rx_flags = flags;
        sp.jitter.push(seq, payload);
        sp.last_rx_ms = now_ms;

        if !sp.speaking {
            sp.speaking = true;
            s.evq.push(Event::Speaking { speaker_id, is_speaking: true });
        }
    }

    /// Pops one queued outgoing datagram, if any.
    pub fn poll_outgoing(&self) -> Option<Vec<u8>> {
        let mut s = self.inner.lock().unwrap();
        let mut buf = [0u8; crate::outgoing::MAX_DATAGRAM_SIZE];
        match s.out_q.pop(&mut buf) {
            Ok(0) => None,
            Ok(n) => Some(buf[..n].to_vec()),
            Err(()) => None,
        }
    }

    /// Advances engine time: drains queued capture frames (encode+queue),
    /// expires stale speaking flags, and decodes one frame per speaker with
    /// data ready. `now_ms` is the host's clock, passed in rather than read
    /// from any internal timer — it must be monotonically non-decreasing
    /// across calls.
    pub fn tick(&self, now_ms: u64) {
        let mut s = self.inner.lock().unwrap();

        let mut frame = [0i16; MAX_CAPTURE_SAMPLES];
        while let Some(n) = s.capture_rx.pop(&mut frame) {
            if n != s.frame_samples {
                continue;
            }
            let samples = frame[..n].to_vec();
            s.encode_and_queue_voice(&samples);
        }

        let n_speakers = s.speakers.len();
        for i in 0..n_speakers {
            s.speakers[i].pcm_count = 0;
        }

        for i in 0..n_speakers {
            if s.speakers[i].speaking && now_ms.saturating_sub(s.speakers[i].last_rx_ms) > SPEAKING_TIMEOUT_MS {
                s.speakers[i].speaking = false;
                let speaker_id = (i + 1) as u16;
                s.evq.push(Event::Speaking { speaker_id, is_speaking: false });
            }

            let popped = s.speakers[i].jitter.pop();
            let Some(maybe_ref) = popped else {
                continue;
            };

            // Copy out of the jitter slot's storage before touching this
            // speaker's decoder/pcm_buf fields: the popped slice borrows
            // from `speakers[i].jitter`, which would otherwise still be
            // considered borrowed while `speakers[i]` is reborrowed below.
            let mut opus_scratch = [0u8; crate::jitter::MAX_OPUS_PACKET];
            let maybe_packet: Option<&[u8]> = match maybe_ref {
                Some(bytes) => {
                    let n = bytes.len();
                    opus_scratch[..n].copy_from_slice(bytes);
                    Some(&opus_scratch[..n])
                }
                None => None,
            };

            let frame_samples = s.frame_samples;
            let sp = &mut s.speakers[i];
            let decoded = sp.decoder.decode(maybe_packet, &mut sp.pcm_buf[..frame_samples]);
            if decoded == 0 {
                continue;
            }

            s.speakers[i].pcm_count = decoded;
            let flags = s.speakers[i].last_rx_flags;
            let channel = wire::flags_channel(flags);
            let sample_rate = s.cfg.sample_rate_hz;

            s.evq.push(Event::PcmFrame(PcmFrameEvent {
                speaker_id: (i + 1) as u16,
                sample_rate,
                channels: 1,
                flags,
                radio_channel: channel,
                sample_count: decoded as u32,
            }));
        }
    }

    /// Pops one host-facing event, resolving the internal `Event`'s message
    /// slot / pcm scratch buffer into an owned `VoiceEvent`.
    pub fn poll_event(&self) -> Option<VoiceEvent> {
        let mut s = self.inner.lock().unwrap();
        let ev = s.evq.pop()?;
        Some(match ev {
            Event::None => return None,
            Event::Log { level, msg_slot } => VoiceEvent::Log {
                level,
                message: s.msg_str(msg_slot),
            },
            Event::Connected => VoiceEvent::Connected,
            Event::Disconnected => VoiceEvent::Disconnected,
            Event::Speaking { speaker_id, is_speaking } => VoiceEvent::Speaking { speaker_id, is_speaking },
            Event::PcmFrame(f) => {
                let idx = (f.speaker_id - 1) as usize;
                let samples = s.speakers[idx].pcm_buf[..f.sample_count as usize].to_vec();
                VoiceEvent::PcmFrame {
                    speaker_id: f.speaker_id,
                    sample_rate: f.sample_rate,
                    channels: f.channels,
                    flags: f.flags,
                    radio_channel: f.radio_channel,
                    samples,
                }
            }
            Event::Error { code, msg_slot } => VoiceEvent::Error {
                code,
                message: s.msg_str(msg_slot),
            },
        })
    }

    /// Sums each speaker's most recently decoded frame into the destination,
    /// clamping to `i16` range. `samples` is always `out_len` long and zeroed
    /// first; `samples_produced` is `out_len` if any speaker had audio this
    /// tick, or `0` if nobody did — mirrors the original `rv_voice_mix_output`
    /// returning `any ? out_samples_per_ch : 0` separately from the buffer.
    pub fn mix_output(&self, out_len: u32) -> MixResult {
        let s = self.inner.lock().unwrap();
        let out_len = out_len as usize;
        let mut mix = vec![0i32; out_len];
        let mut any = false;

        for sp in &s.speakers {
            if sp.pcm_count == 0 {
                continue;
            }
            any = true;
            let n = sp.pcm_count.min(out_len);
            for i in 0..n {
                mix[i] += sp.pcm_buf[i] as i32;
            }
        }

        let samples = mix
            .into_iter()
            .map(|v| v.clamp(i16::MIN as i32, i16::MAX as i32) as i16)
            .collect();

        MixResult {
            samples,
            samples_produced: if any { out_len as u32 } else { 0 },
        }
    }
}

impl Drop for VoiceEngine {
    fn drop(&mut self) {
        log::info!("voice engine dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CaptureMode, Vec3};

    fn cfg(max_players: u16) -> VoiceConfig {
        VoiceConfig {
            api_version: crate::current_api_version(),
            max_players,
            sample_rate_hz: 48000,
            frame_ms: 20,
            capture_mode: CaptureMode::AlwaysOn,
            jitter_target_ms: 60,
            jitter_max_ms: 200,
        }
    }

    fn drain_events(e: &VoiceEngine) -> Vec<VoiceEvent> {
        let mut out = Vec::new();
        while let Some(ev) = e.poll_event() {
            out.push(ev);
        }
        out
    }

    #[test]
    fn rejects_incompatible_api_version() {
        let mut bad = cfg(4);
        bad.api_version = 0x0001_0000;
        assert!(matches!(VoiceEngine::new(bad, None), Err(VoiceError::InvalidArgument)));
    }

    #[test]
    fn rejects_zero_max_players() {
        assert!(matches!(VoiceEngine::new(cfg(0), None), Err(VoiceError::InvalidArgument)));
    }

    #[test]
    fn connect_emits_connected_and_queues_join_packet() {
        let engine = VoiceEngine::new(cfg(4), None).unwrap();
        engine
            .connect(ConnectInfo { session_id: 42, local_player_id: 1 })
            .unwrap();

        let pkt = engine.poll_outgoing().unwrap();
        let (session_id, player_id) = wire::parse_join_payload(&pkt).unwrap();
        assert_eq!(session_id, 42);
        assert_eq!(player_id, 1);

        let events = drain_events(&engine);
        assert!(events.iter().any(|e| matches!(e, VoiceEvent::Connected)));
    }

    #[test]
    fn submit_capture_pcm_wrong_frame_size_is_invalid_argument() {
        let engine = VoiceEngine::new(cfg(4), None).unwrap();
        engine.connect(ConnectInfo { session_id: 1, local_player_id: 1 }).unwrap();
        let wrong = vec![0i16; 10];
        assert!(matches!(
            engine.submit_capture_pcm(wrong),
            Err(VoiceError::InvalidArgument)
        ));
    }

    #[test]
    fn ptt_only_gates_capture_transmission() {
        let mut c = cfg(4);
        c.capture_mode = CaptureMode::PttOnly;
        let engine = VoiceEngine::new(c, None).unwrap();
        engine.connect(ConnectInfo { session_id: 1, local_player_id: 1 }).unwrap();
        let _ = engine.poll_outgoing(); // drain JOIN

        let frame = vec![0i16; 960]; // 48000 * 20ms
        engine.submit_capture_pcm(frame.clone()).unwrap();
        engine.tick(0);
        assert!(engine.poll_outgoing().is_none());

        engine.set_local_state(PlayerState {
            position: Vec3 { x: 0.0, y: 0.0, z: 0.0 },
            forward: Vec3 { x: 0.0, y: 0.0, z: 1.0 },
            ptt_down: true,
            radio_enabled: false,
            radio_channel: 0,
        });
        engine.submit_capture_pcm(frame).unwrap();
        engine.tick(20);
        assert!(engine.poll_outgoing().is_some());
    }

    #[test]
    fn ingest_out_of_range_speaker_id_is_ignored() {
        let engine = VoiceEngine::new(cfg(2), None).unwrap();
        let pkt = wire::build_voice_packet(3, 0, 0, &[1, 2, 3]).unwrap(); // speaker 3 > max_players 2
        engine.ingest_packet(pkt, 0);
        engine.tick(0);
        assert!(drain_events(&engine).is_empty());
    }

    #[test]
    fn ingest_emits_speaking_on_first_packet() {
        let engine = VoiceEngine::new(cfg(2), None).unwrap();
        let pkt = wire::build_voice_packet(1, 0, 0, &[0xde, 0xad, 0xbe, 0xef]).unwrap();
        engine.ingest_packet(pkt, 0);

        let events = drain_events(&engine);
        assert!(events
            .iter()
            .any(|e| matches!(e, VoiceEvent::Speaking { speaker_id: 1, is_speaking: true })));
    }

    /// Spec scenario 4: ingest for speaker 3 at t=0, no timeout by t=100,
    /// `Speaking(false)` once t=300 crosses the 250ms threshold — driven
    /// entirely off host-supplied `now_ms`, never an internal clock.
    #[test]
    fn speaking_timeout_fires_only_past_250ms_of_silence() {
        let engine = VoiceEngine::new(cfg(4), None).unwrap();
        let pkt = wire::build_voice_packet(3, 0, 0, &[1, 2, 3, 4]).unwrap();
        engine.ingest_packet(pkt, 0);
        assert!(drain_events(&engine)
            .iter()
            .any(|e| matches!(e, VoiceEvent::Speaking { speaker_id: 3, is_speaking: true })));

        engine.tick(100);
        assert!(!drain_events(&engine)
            .iter()
            .any(|e| matches!(e, VoiceEvent::Speaking { speaker_id: 3, is_speaking: false })));

        engine.tick(300);
        assert!(drain_events(&engine)
            .iter()
            .any(|e| matches!(e, VoiceEvent::Speaking { speaker_id: 3, is_speaking: false })));
    }

    #[test]
    fn radio_channel_flows_through_to_tx_flags() {
        let engine = VoiceEngine::new(cfg(4), None).unwrap();
        engine.connect(ConnectInfo { session_id: 1, local_player_id: 9 }).unwrap();
        let _ = engine.poll_outgoing(); // drain JOIN

        engine.set_local_state(PlayerState {
            position: Vec3 { x: 0.0, y: 0.0, z: 0.0 },
            forward: Vec3 { x: 0.0, y: 0.0, z: 1.0 },
            ptt_down: true,
            radio_enabled: true,
            radio_channel: 5,
        });
        let frame = vec![0i16; 960];
        engine.submit_capture_pcm(frame).unwrap();
        engine.tick(0);

        let pkt = engine.poll_outgoing().unwrap();
        let (_, _, flags, _) = wire::parse_voice_packet(&pkt).unwrap();
        assert!(wire::flags_is_radio(flags));
        assert_eq!(wire::flags_channel(flags), 5);
        assert!(wire::flags_ptt(flags));
    }

    /// Spec scenario 1 (single-speaker loopback): encode a real captured
    /// frame, hand the resulting VOICE datagram straight back in under a
    /// different speaker id, and confirm it surfaces as a `PcmFrame`.
    #[test]
    fn single_speaker_loopback_round_trip() {
        let engine = VoiceEngine::new(cfg(4), None).unwrap();
        engine.connect(ConnectInfo { session_id: 1234, local_player_id: 1 }).unwrap();
        let _ = engine.poll_outgoing(); // drain JOIN

        engine.set_local_state(PlayerState {
            position: Vec3 { x: 0.0, y: 0.0, z: 0.0 },
            forward: Vec3 { x: 0.0, y: 0.0, z: 1.0 },
            ptt_down: true,
            radio_enabled: false,
            radio_channel: 0,
        });

        let frame: Vec<i16> = (0..960)
            .map(|i| ((i as f32 * 0.1).sin() * 4000.0) as i16)
            .collect();
        engine.submit_capture_pcm(frame).unwrap();
        engine.tick(0);

        let voice_pkt = engine.poll_outgoing().unwrap();
        let (speaker_id, seq, flags, payload) = wire::parse_voice_packet(&voice_pkt).unwrap();
        assert_eq!(speaker_id, 1);
        assert_eq!(seq, 0);

        // Rewrite speaker_id to 2 and ingest as if it came from a peer.
        let loopback_pkt = wire::build_voice_packet(2, seq, flags, payload).unwrap();
        engine.ingest_packet(loopback_pkt, 20);
        engine.tick(20);

        let events = drain_events(&engine);
        let speaking_idx = events
            .iter()
            .position(|e| matches!(e, VoiceEvent::Speaking { speaker_id: 2, is_speaking: true }))
            .expect("Speaking(2, true) not emitted");
        let pcm_idx = events
            .iter()
            .position(|e| matches!(e, VoiceEvent::PcmFrame { speaker_id: 2, .. }))
            .expect("PcmFrame(speaker=2) not emitted");
        let VoiceEvent::PcmFrame { samples, .. } = &events[pcm_idx] else {
            unreachable!();
        };
        assert_eq!(samples.len(), 960);
        assert!(speaking_idx < pcm_idx);
    }

    /// Spec scenario 6 (ingest half): a VOICE packet carrying radio flags
    /// must surface `radio_channel`/`flags` unchanged on the decoded
    /// `PcmFrame` event.
    #[test]
    fn ingest_surfaces_radio_channel_on_pcm_frame() {
        let engine = VoiceEngine::new(cfg(4), None).unwrap();

        // Build a real Opus packet so decode succeeds and emits PcmFrame.
        let enc_engine = VoiceEngine::new(cfg(1), None).unwrap();
        enc_engine.connect(ConnectInfo { session_id: 1, local_player_id: 1 }).unwrap();
        let _ = enc_engine.poll_outgoing();
        enc_engine.set_local_state(PlayerState {
            position: Vec3 { x: 0.0, y: 0.0, z: 0.0 },
            forward: Vec3 { x: 0.0, y: 0.0, z: 1.0 },
            ptt_down: true,
            radio_enabled: false,
            radio_channel: 0,
        });
        enc_engine.submit_capture_pcm(vec![0i16; 960]).unwrap();
        enc_engine.tick(0);
        let encoded_pkt = enc_engine.poll_outgoing().unwrap();
        let (_, seq, _, opus_payload) = wire::parse_voice_packet(&encoded_pkt).unwrap();

        // radio_enabled=1, channel=7, ptt down => 0x01 | (7<<1) | 0x20 = 0x2F
        let flags = wire::flags_make(true, 7, true);
        let pkt = wire::build_voice_packet(1, seq, flags, opus_payload).unwrap();
        engine.ingest_packet(pkt, 0);
        engine.tick(0);

        let events = drain_events(&engine);
        let pcm = events
            .iter()
            .find_map(|e| match e {
                VoiceEvent::PcmFrame {
                    speaker_id: 1,
                    radio_channel,
                    flags,
                    ..
                } => Some((*radio_channel, *flags)),
                _ => None,
            })
            .expect("PcmFrame(speaker=1) not emitted");
        assert_eq!(pcm.0, 7);
        assert!(wire::flags_is_radio(pcm.1));
        assert!(wire::flags_ptt(pcm.1));
    }

    #[test]
    fn mix_output_reports_zero_produced_when_nobody_has_decoded_audio() {
        let engine = VoiceEngine::new(cfg(2), None).unwrap();
        let out = engine.mix_output(960);
        assert_eq!(out.samples, vec![0i16; 960]);
        assert_eq!(out.samples_produced, 0);
    }
}
