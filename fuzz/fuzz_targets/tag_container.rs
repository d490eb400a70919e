#![no_main]

use libfuzzer_sys::fuzz_target;
use tagdeck::gateway::{parse_tag, render_tag};
use tagdeck::TagCollection;

fuzz_target!(|data: &[u8]| {
    let Ok(contents) = parse_tag(data) else {
        return;
    };

    let collection = TagCollection::from_frames(contents.frames.clone());
    let _ = collection.list();
    let frames = collection.raw_frames(contents.version);
    assert_eq!(frames, contents.frames);

    if let Ok(bytes) = render_tag(&contents, 0) {
        let reparsed = parse_tag(&bytes).expect("rendered tag parses");
        assert_eq!(reparsed.frames, contents.frames);
    }
});
