//! Telephony media-stream WebSocket
//!
//! The telephony provider opens this socket after the voice webhook answers.
//! Frames are Twilio Media Streams JSON envelopes:
//!
//! 1. `connected` - ignored
//! 2. `start` - carries the call and stream ids; the call begins here
//! 3. `media` - base64 μ-law audio, forwarded to the speech channel
//! 4. `stop` - the call ends
//!
//! Synthesized speech goes back as `media` envelopes on the same socket.

mod handler;

pub use handler::media_stream_handler;
