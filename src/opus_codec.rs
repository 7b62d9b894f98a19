//! Thin contract over Opus encode/decode with a fixed per-session frame size.
//!
//! Opus itself is an external collaborator (spec.md §1); this module owns
//! only the adapter surface the engine needs: exact frame sizes in, a sample
//! count out, and a `None` packet meaning "please conceal this loss".

use opus::{Application, Channels, Decoder, Encoder};

use crate::error::VoiceError;

pub struct OpusCodecConfig {
    pub sample_rate_hz: u32,
    pub frame_samples: usize,
}

pub struct OpusEncoderAdapter {
    enc: Encoder,
    frame_samples: usize,
}

impl OpusEncoderAdapter {
    pub fn new(cfg: &OpusCodecConfig) -> Result<Self, VoiceError> {
        let mut enc = Encoder::new(cfg.sample_rate_hz, Channels::Mono, Application::Voip)
            .map_err(|_| VoiceError::Internal)?;
        // Best-effort tuning; failure here is not fatal to encoder usability.
        let _ = enc.set_bitrate(opus::Bitrate::Bits(20_000));
        let _ = enc.set_inband_fec(true);
        let _ = enc.set_packet_loss_perc(5);
        Ok(Self {
            enc,
            frame_samples: cfg.frame_samples,
        })
    }

    /// Encodes exactly `frame_samples` mono i16 samples into `out`, returning
    /// the number of bytes written. Fails if `pcm.len() != frame_samples`.
    pub fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize, VoiceError> {
        if pcm.len() != self.frame_samples {
            return Err(VoiceError::InvalidArgument);
        }
        self.enc.encode(pcm, out).map_err(|e| {
            log::error!("opus encode failed: {e}");
            VoiceError::Internal
        })
    }
}

pub struct OpusDecoderAdapter {
    dec: Decoder,
    frame_samples: usize,
}

impl OpusDecoderAdapter {
    pub fn new(cfg: &OpusCodecConfig) -> Result<Self, VoiceError> {
        let dec = Decoder::new(cfg.sample_rate_hz, Channels::Mono).map_err(|_| VoiceError::Internal)?;
        Ok(Self {
            dec,
            frame_samples: cfg.frame_samples,
        })
    }

    /// Decodes `packet` into `out`. `packet = None` requests packet-loss
    /// concealment, synthesizing a frame instead of failing. Returns the
    /// number of samples per channel produced, or 0 on decode failure.
    pub fn decode(&mut self, packet: Option<&[u8]>, out: &mut [i16]) -> usize {
        debug_assert!(out.len() >= self.frame_samples);
        let result = match packet {
            Some(data) => self.dec.decode(data, out, false),
            None => self.dec.decode(&[], out, false),
        };
        match result {
            Ok(n) => n,
            Err(e) => {
                log::error!("opus decode failed: {e}");
                0
            }
        }
    }
}
