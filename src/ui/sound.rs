/// Sound engine: procedural 8-bit style sound effects via rodio.
///
/// All sounds are generated as in-memory WAV buffers at init time.
/// Playback is fire-and-forget (non-blocking) via rodio's Sink.
///
/// Build without the "sound" feature to disable audio entirely (the stub
/// SoundEngine does nothing). Event-to-effect mapping is shared by both.

use crate::sim::event::GameEvent;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Sfx {
    Step,
    Bump,
    Push,
    Splash,
    Sizzle,
    Die,
    Win,
    Undo,
}

/// Which effect (if any) an engine event makes.
pub fn sfx_for(event: &GameEvent) -> Option<Sfx> {
    let sfx = match event {
        GameEvent::ActionStarted { .. } => Sfx::Step,
        GameEvent::ActionRejected { .. } => Sfx::Bump,
        GameEvent::BlockPushed { .. } => Sfx::Push,
        GameEvent::Bridged { .. } => Sfx::Splash,
        GameEvent::BlockBurned { .. } => Sfx::Sizzle,
        GameEvent::PlayerDied { .. } => Sfx::Die,
        GameEvent::LevelWon { .. } => Sfx::Win,
        GameEvent::Undone | GameEvent::Restarted => Sfx::Undo,
        _ => return None,
    };
    Some(sfx)
}

#[cfg(feature = "sound")]
mod inner {
    use std::io::Cursor;
    use std::sync::Arc;

    use rodio::{OutputStream, OutputStreamHandle, Sink};

    use super::Sfx;

    const SAMPLE_RATE: u32 = 22050;
    const TAU: f32 = std::f32::consts::TAU;

    /// Pre-generated WAV buffers, indexed by `Sfx as usize`.
    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        buffers: Vec<Arc<Vec<u8>>>,
    }

    impl SoundEngine {
        pub fn new() -> Option<Self> {
            let (stream, handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(e) => {
                    log::warn!("no audio output, sound disabled: {e}");
                    return None;
                }
            };

            // ── Generate all sound buffers (order matches Sfx) ──
            let buffers = [
                gen_step(),
                gen_bump(),
                gen_push(),
                gen_splash(),
                gen_sizzle(),
                gen_die(),
                gen_win(),
                gen_undo(),
            ]
            .iter()
            .map(|s| Arc::new(make_wav(s)))
            .collect();

            Some(SoundEngine { _stream: stream, handle, buffers })
        }

        pub fn play(&self, sfx: Sfx) {
            let Some(buf) = self.buffers.get(sfx as usize) else { return };
            if let Ok(sink) = Sink::try_new(&self.handle) {
                let cursor = Cursor::new(buf.as_ref().clone());
                if let Ok(src) = rodio::Decoder::new(cursor) {
                    sink.append(src);
                    sink.detach(); // fire-and-forget
                }
            }
        }
    }

    // ════════════════════════════════════════════════════════════
    //  Waveform generators — all produce Vec<f32> mono samples
    // ════════════════════════════════════════════════════════════

    /// Notes played back to back; each fades by `decay` over its length.
    fn notes(freqs: &[f32], note_dur: f32, decay: f32, volume: f32) -> Vec<f32> {
        let mut samples = Vec::new();
        for &freq in freqs {
            let n = (SAMPLE_RATE as f32 * note_dur) as usize;
            for i in 0..n {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32) * decay;
                // Sine + 3rd harmonic for a square-ish retro feel
                let wave = (t * freq * TAU).sin() * 0.7 + (t * freq * 3.0 * TAU).sin() * 0.3;
                samples.push(wave * env * volume);
            }
        }
        samples
    }

    /// Tone sweeping linearly from `f0` to `f1`, mixed with LCG noise.
    fn sweep(f0: f32, f1: f32, duration: f32, noise_mix: f32, volume: f32) -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * duration) as usize;
        let mut rng: u32 = 12345;
        let mut phase = 0.0_f32;
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                let freq = f0 + (f1 - f0) * t;
                phase += freq / SAMPLE_RATE as f32;
                let tone = (phase * TAU).sin();
                rng = rng.wrapping_mul(1103515245).wrapping_add(12345);
                let noise = (rng as f32 / u32::MAX as f32) * 2.0 - 1.0;
                let env = (1.0 - t).powf(0.8);
                (tone * (1.0 - noise_mix) + noise * noise_mix) * env * volume
            })
            .collect()
    }

    fn gen_step() -> Vec<f32> {
        sweep(520.0, 440.0, 0.03, 0.0, 0.15)
    }

    fn gen_bump() -> Vec<f32> {
        sweep(140.0, 90.0, 0.06, 0.3, 0.25)
    }

    /// Crate scrape: low noisy grind
    fn gen_push() -> Vec<f32> {
        sweep(180.0, 120.0, 0.12, 0.6, 0.3)
    }

    /// Crate sinking into water: falling bubble
    fn gen_splash() -> Vec<f32> {
        let mut s = sweep(900.0, 200.0, 0.18, 0.2, 0.25);
        s.extend(sweep(300.0, 150.0, 0.12, 0.7, 0.15));
        s
    }

    /// Crate lost in lava: hiss
    fn gen_sizzle() -> Vec<f32> {
        sweep(2000.0, 1500.0, 0.3, 0.9, 0.2)
    }

    /// Death: sad descending tone, faded at the tail
    fn gen_die() -> Vec<f32> {
        let mut samples = notes(&[440.0, 370.0, 311.0, 261.0], 0.12, 0.3, 0.3);
        let fade_len = samples.len() / 4;
        let total = samples.len();
        for (i, s) in samples.iter_mut().enumerate().skip(total - fade_len) {
            *s *= (total - i) as f32 / fade_len as f32;
        }
        samples
    }

    /// Goal reached: ascending fanfare with a held top note
    fn gen_win() -> Vec<f32> {
        let mut samples = notes(&[523.0, 659.0, 784.0], 0.1, 0.3, 0.3);
        samples.extend(notes(&[1047.0], 0.3, 1.0, 0.3));
        samples
    }

    /// Rewind: quick descending two-note blip
    fn gen_undo() -> Vec<f32> {
        notes(&[784.0, 523.0], 0.04, 0.5, 0.2)
    }

    // ════════════════════════════════════════════════════════════
    //  WAV encoder — wraps f32 samples into a valid WAV buffer
    // ════════════════════════════════════════════════════════════

    fn make_wav(samples: &[f32]) -> Vec<u8> {
        let num_channels: u16 = 1;
        let bits_per_sample: u16 = 16;
        let byte_rate = SAMPLE_RATE * (num_channels as u32) * (bits_per_sample as u32) / 8;
        let block_align = num_channels * bits_per_sample / 8;
        let data_size = samples.len() as u32 * 2;
        let file_size = 36 + data_size;

        let mut buf = Vec::with_capacity(44 + data_size as usize);

        // RIFF header
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&file_size.to_le_bytes());
        buf.extend_from_slice(b"WAVE");

        // fmt chunk
        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
        buf.extend_from_slice(&num_channels.to_le_bytes());
        buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        buf.extend_from_slice(&byte_rate.to_le_bytes());
        buf.extend_from_slice(&block_align.to_le_bytes());
        buf.extend_from_slice(&bits_per_sample.to_le_bytes());

        // data chunk
        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_size.to_le_bytes());

        for &s in samples {
            let val = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
            buf.extend_from_slice(&val.to_le_bytes());
        }

        buf
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn wav_header_sizes() {
            let wav = make_wav(&gen_step());
            assert_eq!(&wav[0..4], b"RIFF");
            let data = u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]) as usize;
            assert_eq!(wav.len(), 44 + data);
        }
    }
}

// ════════════════════════════════════════════════════════════
//  Public API — compiles to no-ops when sound feature is off
// ════════════════════════════════════════════════════════════

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> { Some(SoundEngine) }
    pub fn play(&self, _sfx: Sfx) {}
}

impl SoundEngine {
    /// Play the effect for every event that has one.
    pub fn play_events(&self, events: &[GameEvent]) {
        for sfx in events.iter().filter_map(sfx_for) {
            self.play(sfx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::{Dir, Pos};
    use crate::sim::session::DeathCause;

    #[test]
    fn events_map_to_effects() {
        assert_eq!(sfx_for(&GameEvent::ActionStarted { dir: Dir::Up }), Some(Sfx::Step));
        assert_eq!(sfx_for(&GameEvent::Bridged { at: Pos::new(1, 1) }), Some(Sfx::Splash));
        assert_eq!(sfx_for(&GameEvent::PlayerDied { cause: DeathCause::Burned }), Some(Sfx::Die));
        assert_eq!(sfx_for(&GameEvent::SettleTimeout), None);
        assert_eq!(
            sfx_for(&GameEvent::HazardMoved { index: 0, from: Pos::new(0, 0), to: Pos::new(1, 0) }),
            None
        );
    }
}
