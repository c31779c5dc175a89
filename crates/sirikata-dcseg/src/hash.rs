//! The cross-node lower-tree handle (I3): `mLowerLevelTrees` is keyed
//! by `sha1(serialize(boundingBox))` of the upper-tree leaf the lower
//! tree hangs off.

use sha1::{Digest, Sha1};
use sirikata_messaging::cseg_wire::encode_bbox;
use sirikata_types::BoundingBox;

pub type BboxHash = [u8; 20];

pub fn bbox_hash(bbox: &BoundingBox) -> BboxHash {
    let mut bytes = Vec::with_capacity(24);
    encode_bbox(&mut bytes, bbox);
    let digest = Sha1::digest(&bytes);
    let mut out = [0u8; 20];
    out.copy_from_slice(digest.as_slice());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sirikata_types::Vector3;

    #[test]
    fn hash_is_stable_and_distinguishes_boxes() {
        let a = BoundingBox::new(Vector3::ZERO, Vector3::new(1.0, 1.0, 1.0));
        let b = BoundingBox::new(Vector3::ZERO, Vector3::new(2.0, 1.0, 1.0));
        assert_eq!(bbox_hash(&a), bbox_hash(&a));
        assert_ne!(bbox_hash(&a), bbox_hash(&b));
    }
}
