#![no_main]

use libfuzzer_sys::fuzz_target;
use wiresink_rs::frame::{decode_frame, encode_frame, peek_envelope};
use wiresink_rs::payload::decode_parameters;

fuzz_target!(|data: &[u8]| {
    let _ = peek_envelope(data);

    match decode_frame(data) {
        Ok(frame) => {
            // A frame that decodes must encode back to the same bytes
            assert_eq!(encode_frame(&frame), data);
            let _ = decode_parameters(&frame.payload, usize::from(frame.param_count));
        }
        Err(e) => assert!(e.is_frame_fatal()),
    }

    // Parameter lists are walked even when the envelope is garbage
    let _ = decode_parameters(data, 15);
});
