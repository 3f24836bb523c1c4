#![no_main]

use libfuzzer_sys::fuzz_target;
use wire_formatter::buffer::{BlockPool, SequenceBuffer};
use wire_formatter::{Resolver, SequenceReader};

fuzz_target!(|data: &[u8]| {
    let Some((&block, rest)) = data.split_first() else {
        return;
    };

    // Same bytes, chopped into tiny segments, must decode the same way.
    let mut sequence = SequenceBuffer::new(BlockPool::fixed(usize::from(block % 16) + 1, 4));
    if sequence.write(rest).is_err() {
        return;
    }
    let mut reader = SequenceReader::new(sequence.freeze());

    let Ok(formatter) = Resolver::global().get_formatter::<Vec<String>>() else {
        return;
    };
    let segmented = formatter.deserialize(&mut reader).ok();
    let flat = wire_formatter::deserialize::<Vec<String>>(rest).ok();
    if reader.is_end() {
        assert_eq!(segmented, flat);
    }
});
