//! Shared fixtures: a scripted decode engine and stream helpers.

#![allow(dead_code)]

use bridge_traits::stream::MemoryStream;
use bridge_traits::stream_io::StreamIoBridge;
use core_metadata::{MetadataBlock, MetadataError, StreamInfo, VorbisComment};
use core_playback::{
    DecodeEngine, DecodeErrorStatus, DecodedFrame, DecoderClient, EngineState, PlaybackError,
    Result, WriteStatus,
};

// ============================================================================
// Scripted Engine
// ============================================================================

/// One unit of engine output.
#[derive(Debug, Clone)]
pub enum Step {
    Frame {
        channels: u16,
        sample_rate: u32,
        bits: u32,
        block_size: usize,
        value: i32,
    },
    Error(DecodeErrorStatus),
}

impl Step {
    pub fn frame(block_size: usize, value: i32) -> Self {
        Step::Frame {
            channels: 2,
            sample_rate: 44_100,
            bits: 16,
            block_size,
            value,
        }
    }
}

/// Engine that replays a fixed list of metadata blocks and frames.
pub struct ScriptedEngine {
    pub blocks: Vec<MetadataBlock>,
    pub steps: Vec<Step>,
    pub fail_metadata: bool,
    pub seeks: Vec<u64>,
    pub flushes: usize,
    pub resets: usize,
    cursor: usize,
    state: EngineState,
    planes: Vec<Vec<i32>>,
}

impl ScriptedEngine {
    pub fn new(blocks: Vec<MetadataBlock>, steps: Vec<Step>) -> Self {
        Self {
            blocks,
            steps,
            fail_metadata: false,
            seeks: Vec::new(),
            flushes: 0,
            resets: 0,
            cursor: 0,
            state: EngineState::Unattached,
            planes: Vec::new(),
        }
    }

    pub fn failing() -> Self {
        let mut engine = Self::new(Vec::new(), Vec::new());
        engine.fail_metadata = true;
        engine
    }
}

impl DecodeEngine for ScriptedEngine {
    fn reset(&mut self, _stream: StreamIoBridge) -> Result<()> {
        self.resets += 1;
        self.cursor = 0;
        self.state = EngineState::SearchForMetadata;
        Ok(())
    }

    fn process_until_end_of_metadata(&mut self, client: &mut dyn DecoderClient) -> Result<()> {
        if self.fail_metadata {
            self.state = EngineState::Aborted;
            return Err(PlaybackError::Metadata(MetadataError::NotFlac(
                "scripted failure".to_string(),
            )));
        }
        for block in &self.blocks {
            client.metadata(block);
        }
        self.state = EngineState::ReadFrame;
        Ok(())
    }

    fn process_single(&mut self, client: &mut dyn DecoderClient) -> Result<()> {
        match self.state {
            EngineState::ReadFrame => {}
            EngineState::EndOfStream | EngineState::Aborted => return Ok(()),
            state => {
                return Err(PlaybackError::InvalidState(format!(
                    "scripted engine in {state:?}"
                )))
            }
        }

        let Some(step) = self.steps.get(self.cursor).cloned() else {
            self.state = EngineState::EndOfStream;
            return Ok(());
        };
        self.cursor += 1;

        match step {
            Step::Frame {
                channels,
                sample_rate,
                bits,
                block_size,
                value,
            } => {
                self.planes = vec![vec![value; block_size]; channels as usize];
                let frame = DecodedFrame {
                    channels,
                    sample_rate,
                    bits_per_sample: bits,
                    block_size,
                    planes: &self.planes,
                };
                match client.write(&frame) {
                    WriteStatus::Continue => Ok(()),
                    WriteStatus::Abort => {
                        self.state = EngineState::Aborted;
                        Err(PlaybackError::Aborted("scripted write aborted".to_string()))
                    }
                }
            }
            Step::Error(status) => {
                client.error(status);
                Ok(())
            }
        }
    }

    fn seek_absolute(&mut self, sample: u64) -> Result<()> {
        self.seeks.push(sample);
        self.state = EngineState::ReadFrame;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        if self.state == EngineState::Aborted {
            self.state = EngineState::ReadFrame;
        }
        Ok(())
    }

    fn state(&self) -> EngineState {
        self.state
    }

    fn release(&mut self) {
        self.state = EngineState::Unattached;
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn stream_info(sample_rate: u32, channels: u16, bits: u32, total_samples: u64) -> StreamInfo {
    StreamInfo {
        min_block_size: 4096,
        max_block_size: 4096,
        sample_rate,
        channels,
        bits_per_sample: bits,
        total_samples,
        ..Default::default()
    }
}

/// STREAMINFO for 10 seconds of CD audio plus a comment block.
pub fn cd_blocks(comments: &[(&str, &str)]) -> Vec<MetadataBlock> {
    let mut comment = VorbisComment::new("test vendor");
    for (key, value) in comments {
        comment.push(key, value);
    }
    vec![
        MetadataBlock::StreamInfo(stream_info(44_100, 2, 16, 441_000)),
        MetadataBlock::VorbisComment(comment),
    ]
}

/// A sized stream of `len` zero bytes; the scripted engine never reads it.
pub fn sized_stream(len: usize) -> StreamIoBridge {
    StreamIoBridge::from_handle(MemoryStream::new(vec![0u8; len]), "scripted")
}
