////////////////////////////////////////////////////////////////////////////////
// This file is part of "Ad Astra", an embeddable scripting programming       //
// language platform.                                                         //
//                                                                            //
// This work is proprietary software with source-available code.              //
//                                                                            //
// To copy, use, distribute, or contribute to this work, you must agree to    //
// the terms of the General License Agreement:                                //
//                                                                            //
// https://github.com/Eliah-Lakhin/ad-astra/blob/master/EULA.md               //
//                                                                            //
// The agreement grants a Basic Commercial License, allowing you to use       //
// this work in non-commercial and limited commercial products with a total   //
// gross revenue cap. To remove this commercial limit for one of your         //
// products, you must acquire a Full Commercial License.                      //
//                                                                            //
// If you contribute to the source code, documentation, or related materials, //
// you must grant me an exclusive license to these contributions.             //
// Contributions are governed by the "Contributions" section of the General   //
// License Agreement.                                                         //
//                                                                            //
// Copying the work in parts is strictly forbidden, except as permitted       //
// under the General License Agreement.                                       //
//                                                                            //
// If you do not or cannot agree to the terms of this Agreement,              //
// do not use this work.                                                      //
//                                                                            //
// This work is provided "as is", without any warranties, express or implied, //
// except where such disclaimers are legally invalid.                         //
//                                                                            //
// Copyright (c) 2024 Ilya Lakhin (Илья Александрович Лахин).                 //
// All rights reserved.                                                       //
////////////////////////////////////////////////////////////////////////////////

use std::sync::{Arc, RwLock};

use ahash::AHashMap;
use compact_str::CompactString;

use crate::{
    runtime::{RuntimeError, RuntimeResult, Value},
    sync::{read, write},
};

// A scope of variable slots keyed by the parameter ids.
//
// Frames are shared: a closure keeps the frame it was created in, so
// assignments inside the closure are visible to the enclosing scope and
// vice versa.
pub(super) struct Frame {
    slots: RwLock<AHashMap<usize, Value>>,
    parent: Option<Arc<Frame>>,
}

impl Frame {
    #[inline(always)]
    pub(super) fn root() -> Arc<Self> {
        Arc::new(Self {
            slots: RwLock::new(AHashMap::new()),
            parent: None,
        })
    }

    #[inline(always)]
    pub(super) fn child(self: &Arc<Self>) -> Arc<Self> {
        Arc::new(Self {
            slots: RwLock::new(AHashMap::new()),
            parent: Some(self.clone()),
        })
    }

    // Declares a slot in this frame.
    #[inline(always)]
    pub(super) fn bind(&self, id: usize, value: Value) {
        let _ = write(&self.slots).insert(id, value);
    }

    pub(super) fn get(&self, id: usize, name: &CompactString) -> RuntimeResult<Value> {
        let mut current = Some(self);

        while let Some(frame) = current {
            if let Some(value) = read(&frame.slots).get(&id) {
                return Ok(value.clone());
            }

            current = frame.parent.as_deref();
        }

        Err(RuntimeError::UnboundParameter { name: name.clone() })
    }

    // Writes the nearest slot with the id.
    pub(super) fn set(&self, id: usize, name: &CompactString, value: Value) -> RuntimeResult<()> {
        let mut current = Some(self);

        while let Some(frame) = current {
            let mut slots = write(&frame.slots);

            if let Some(slot) = slots.get_mut(&id) {
                *slot = value;
                return Ok(());
            }

            drop(slots);

            current = frame.parent.as_deref();
        }

        Err(RuntimeError::UnboundParameter { name: name.clone() })
    }
}

#[cfg(test)]
mod tests {
    use compact_str::CompactString;

    use crate::{
        interpret::frame::Frame,
        runtime::{RuntimeError, Value},
    };

    #[test]
    fn test_frame_lookup() {
        let name = CompactString::new("x");

        let root = Frame::root();

        root.bind(1, Value::I32(1));

        let child = root.child();

        assert_eq!(child.get(1, &name).unwrap(), Value::I32(1));

        child.set(1, &name, Value::I32(2)).unwrap();

        assert_eq!(root.get(1, &name).unwrap(), Value::I32(2));

        child.bind(1, Value::I32(3));
        child.set(1, &name, Value::I32(4)).unwrap();

        assert_eq!(root.get(1, &name).unwrap(), Value::I32(2));
        assert_eq!(child.get(1, &name).unwrap(), Value::I32(4));

        assert!(matches!(
            child.get(2, &name),
            Err(RuntimeError::UnboundParameter { .. }),
        ));
    }
}
