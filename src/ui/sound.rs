/// Sound engine: procedural chiptune effects and a music loop via rodio.
///
/// All effects are generated as in-memory WAV buffers at init time.
/// Effects are fire-and-forget but tracked, so a game over can cut them.
/// The music loop has its own sink and fades out on request.
///
/// Compile without the "sound" feature to disable audio entirely
/// (the stub SoundEngine does nothing).

use crate::sim::event::GameEvent;

#[cfg(feature = "sound")]
mod inner {
    use std::collections::HashMap;
    use std::f32::consts::TAU;
    use std::io::Cursor;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use log::{debug, warn};
    use rodio::{OutputStream, OutputStreamHandle, Sink, Source};

    use crate::sim::event::SoundId;

    const SAMPLE_RATE: u32 = 22050;
    const MUSIC_VOLUME: f32 = 0.35;

    struct Fade {
        started: Instant,
        duration: Duration,
    }

    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        effects: HashMap<SoundId, Arc<Vec<u8>>>,
        music_buf: Arc<Vec<u8>>,
        playing: Vec<Sink>,
        music: Option<Sink>,
        fade: Option<Fade>,
    }

    impl SoundEngine {
        pub fn new() -> Option<Self> {
            let (stream, handle) = OutputStream::try_default().ok()?;

            let effects = ALL_SOUNDS
                .iter()
                .map(|&id| (id, Arc::new(make_wav(&generate(id)))))
                .collect();

            Some(SoundEngine {
                _stream: stream,
                handle,
                effects,
                music_buf: Arc::new(make_wav(&gen_music())),
                playing: Vec::new(),
                music: None,
                fade: None,
            })
        }

        pub fn play(&mut self, id: SoundId) {
            let Some(buf) = self.effects.get(&id) else { return };
            let Ok(sink) = Sink::try_new(&self.handle) else { return };
            match rodio::Decoder::new(Cursor::new(buf.as_ref().clone())) {
                Ok(src) => {
                    sink.append(src);
                    self.playing.retain(|s| !s.empty());
                    self.playing.push(sink);
                }
                Err(e) => warn!("sound {:?} undecodable: {}", id, e),
            }
        }

        pub fn stop_effects(&mut self) {
            for sink in self.playing.drain(..) {
                sink.stop();
            }
        }

        pub fn start_music(&mut self) {
            if let Some(old) = self.music.take() {
                old.stop();
            }
            self.fade = None;
            let Ok(sink) = Sink::try_new(&self.handle) else { return };
            if let Ok(src) = rodio::Decoder::new(Cursor::new(self.music_buf.as_ref().clone())) {
                sink.set_volume(MUSIC_VOLUME);
                sink.append(src.repeat_infinite());
                self.music = Some(sink);
                debug!("music started");
            }
        }

        pub fn fade_out_music(&mut self, duration_ms: u64) {
            if self.music.is_some() {
                self.fade = Some(Fade { started: Instant::now(), duration: Duration::from_millis(duration_ms.max(1)) });
            }
        }

        /// Advance the music fade. Call once per frame.
        pub fn update(&mut self) {
            let Some(fade) = &self.fade else { return };
            let t = fade.started.elapsed().as_secs_f32() / fade.duration.as_secs_f32();
            if t >= 1.0 {
                if let Some(m) = self.music.take() {
                    m.stop();
                }
                self.fade = None;
            } else if let Some(m) = &self.music {
                m.set_volume(MUSIC_VOLUME * (1.0 - t));
            }
        }
    }

    const ALL_SOUNDS: [SoundId; 10] = [
        SoundId::Warning,
        SoundId::Reward,
        SoundId::Penalty,
        SoundId::TollBell,
        SoundId::AmbushSting,
        SoundId::AmbushLaugh,
        SoundId::Disappear,
        SoundId::Spawn,
        SoundId::Transition,
        SoundId::GameOver,
    ];

    // ════════════════════════════════════════════════════════════
    //  Waveform generators: all produce Vec<f32> mono samples
    // ════════════════════════════════════════════════════════════

    fn generate(id: SoundId) -> Vec<f32> {
        match id {
            SoundId::Warning => notes(&[(440.0, 0.08), (0.0, 0.05), (440.0, 0.08)], 0.25),
            SoundId::Reward => notes(&[(1047.0, 0.05), (1319.0, 0.05), (1568.0, 0.08)], 0.22),
            SoundId::Penalty => sweep(300.0, 120.0, 0.18, 0.3),
            SoundId::TollBell => bell(880.0, 0.4),
            SoundId::AmbushSting => chord(&[466.0, 494.0, 740.0], 0.35, 0.2),
            SoundId::AmbushLaugh => notes(&[(330.0, 0.07), (0.0, 0.04), (294.0, 0.07), (0.0, 0.04), (262.0, 0.1)], 0.25),
            SoundId::Disappear => sweep(400.0, 1200.0, 0.2, 0.18),
            SoundId::Spawn => notes(&[(660.0, 0.04)], 0.2),
            SoundId::Transition => sweep(200.0, 800.0, 0.25, 0.15),
            SoundId::GameOver => notes(&[(392.0, 0.2), (330.0, 0.2), (262.0, 0.45)], 0.3),
        }
    }

    /// Square-ish wave (sine + 3rd harmonic) for the retro feel.
    fn voice(t: f32, freq: f32) -> f32 {
        (t * freq * TAU).sin() * 0.7 + (t * freq * 3.0 * TAU).sin() * 0.3
    }

    /// Sequence of (frequency, seconds); frequency 0 is a rest.
    fn notes(seq: &[(f32, f32)], volume: f32) -> Vec<f32> {
        let mut out = Vec::new();
        for &(freq, dur) in seq {
            let n = (SAMPLE_RATE as f32 * dur) as usize;
            for i in 0..n {
                if freq == 0.0 {
                    out.push(0.0);
                    continue;
                }
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32).powf(0.5);
                out.push(voice(t, freq) * env * volume);
            }
        }
        out
    }

    fn sweep(from: f32, to: f32, dur: f32, volume: f32) -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * dur) as usize;
        let mut phase = 0.0_f32;
        (0..n)
            .map(|i| {
                let k = i as f32 / n as f32;
                phase += (from + (to - from) * k) / SAMPLE_RATE as f32;
                (phase * TAU).sin() * (1.0 - k) * volume
            })
            .collect()
    }

    fn bell(freq: f32, dur: f32) -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * dur) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = (-6.0 * t / dur).exp();
                ((t * freq * TAU).sin() + 0.4 * (t * freq * 2.76 * TAU).sin()) * env * 0.2
            })
            .collect()
    }

    fn chord(freqs: &[f32], dur: f32, volume: f32) -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * dur) as usize;
        let k = 1.0 / freqs.len().max(1) as f32;
        (0..n)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - i as f32 / n as f32;
                freqs.iter().map(|&f| voice(t, f)).sum::<f32>() * k * env * volume
            })
            .collect()
    }

    /// Eight-bar loop in C major.
    fn gen_music() -> Vec<f32> {
        const MELODY: [f32; 16] = [
            523.0, 659.0, 784.0, 659.0, 587.0, 698.0, 880.0, 698.0,
            523.0, 659.0, 784.0, 1047.0, 988.0, 784.0, 659.0, 587.0,
        ];
        let seq: Vec<(f32, f32)> = MELODY.iter().map(|&f| (f, 0.22)).collect();
        notes(&seq, 0.12)
    }

    // ════════════════════════════════════════════════════════════
    //  WAV encoder: 16-bit mono PCM
    // ════════════════════════════════════════════════════════════

    fn make_wav(samples: &[f32]) -> Vec<u8> {
        let data_size = samples.len() as u32 * 2;
        let mut buf = Vec::with_capacity(44 + data_size as usize);

        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&(36 + data_size).to_le_bytes());
        buf.extend_from_slice(b"WAVE");

        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
        buf.extend_from_slice(&1u16.to_le_bytes()); // mono
        buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        buf.extend_from_slice(&(SAMPLE_RATE * 2).to_le_bytes());
        buf.extend_from_slice(&2u16.to_le_bytes());
        buf.extend_from_slice(&16u16.to_le_bytes());

        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_size.to_le_bytes());
        for &s in samples {
            buf.extend_from_slice(&((s.clamp(-1.0, 1.0) * 32767.0) as i16).to_le_bytes());
        }
        buf
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn every_effect_has_samples() {
            for id in ALL_SOUNDS {
                let s = generate(id);
                assert!(!s.is_empty(), "{:?}", id);
                assert!(s.iter().all(|v| v.abs() <= 1.0));
            }
        }

        #[test]
        fn wav_header_sizes() {
            let wav = make_wav(&[0.0; 10]);
            assert_eq!(wav.len(), 44 + 20);
            assert_eq!(&wav[0..4], b"RIFF");
            assert_eq!(u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]), 20);
        }
    }
}

// ════════════════════════════════════════════════════════════
//  Public API: compiles to no-ops when sound feature is off
// ════════════════════════════════════════════════════════════

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> { Some(SoundEngine) }
    pub fn play(&mut self, _id: crate::sim::event::SoundId) {}
    pub fn stop_effects(&mut self) {}
    pub fn start_music(&mut self) {}
    pub fn fade_out_music(&mut self, _duration_ms: u64) {}
    pub fn update(&mut self) {}
}

/// Route the audio-relevant step events to the engine.
pub fn dispatch(engine: &mut SoundEngine, events: &[GameEvent]) {
    for ev in events {
        match ev {
            GameEvent::PlaySound(id) => engine.play(*id),
            GameEvent::StopEffects => engine.stop_effects(),
            GameEvent::StartMusic => engine.start_music(),
            GameEvent::FadeOutMusic { duration_ms } => engine.fade_out_music(*duration_ms),
            _ => {}
        }
    }
}
