//! Property-based tests for wire framing
//!
//! These verify the reassembly invariant: however the transport slices or
//! amalgamates the byte stream, the assembler yields exactly the original
//! message bodies, in order, and ends every round with no leftover state.

use proptest::prelude::*;
use stagelink_core::framing::{encode_frame, FrameAssembler};

const MAX_FRAME: usize = 64 * 1024;

/// Generate a non-empty message body
fn arb_body() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..512)
}

/// Generate a batch of message bodies
fn arb_bodies() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(arb_body(), 1..6)
}

/// Generate cut points to slice a wire buffer of the given length
fn arb_cuts(len: usize) -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1..len.max(2), 0..8).prop_map(|mut cuts| {
        cuts.sort_unstable();
        cuts.dedup();
        cuts
    })
}

fn deliver_in_slices(wire: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut asm = FrameAssembler::new(MAX_FRAME);
    let mut frames = Vec::new();
    let mut start = 0;
    for &cut in cuts.iter().filter(|&&c| c < wire.len()) {
        frames.extend(asm.append(&wire[start..cut]).expect("chunk accepted"));
        start = cut;
    }
    frames.extend(asm.append(&wire[start..]).expect("tail accepted"));
    assert!(!asm.has_partial(), "assembler left with partial state");
    frames.into_iter().map(|f| f.into_bytes()).collect()
}

proptest! {
    /// Property: any split of one message reassembles to exactly that message
    #[test]
    fn arbitrary_splits_yield_one_identical_frame(
        body in arb_body(),
        cuts in arb_cuts(600),
    ) {
        let wire = encode_frame(&body).expect("encodable");
        let frames = deliver_in_slices(&wire, &cuts);
        prop_assert_eq!(frames, vec![body]);
    }

    /// Property: amalgamated messages split back into the original sequence
    #[test]
    fn amalgamated_messages_split_in_order(bodies in arb_bodies()) {
        let mut wire = Vec::new();
        for body in &bodies {
            wire.extend(encode_frame(body).expect("encodable"));
        }

        let mut asm = FrameAssembler::new(MAX_FRAME);
        let frames = asm.append(&wire).expect("delivery accepted");
        prop_assert_eq!(
            frames.into_iter().map(|f| f.into_bytes()).collect::<Vec<_>>(),
            bodies
        );
        prop_assert!(!asm.has_partial());
    }

    /// Property: slicing a multi-message stream anywhere preserves bodies and order
    #[test]
    fn sliced_stream_preserves_bodies_and_order(
        bodies in arb_bodies(),
        cuts in arb_cuts(4096),
    ) {
        let mut wire = Vec::new();
        for body in &bodies {
            wire.extend(encode_frame(body).expect("encodable"));
        }
        let frames = deliver_in_slices(&wire, &cuts);
        prop_assert_eq!(frames, bodies);
    }
}
