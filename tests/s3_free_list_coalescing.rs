use gvrs::store::allocator::{FreeBlock, FreeList};

/// Three adjacent blocks released out of order should merge back into a
/// single free span, exactly as if they had never been split apart.
#[test]
fn releasing_three_adjacent_blocks_out_of_order_reunites_them() {
    let mut free_list = FreeList::new();

    let a = free_list.dealloc(1024, 512);
    assert_eq!(a, FreeBlock { pos: 1024, size: 512 });

    // releasing the block to the right of `a` should merge into it.
    let b = free_list.dealloc(1536, 512);
    assert_eq!(b, FreeBlock { pos: 1024, size: 1024 });

    // releasing the block to the left of the merged span should merge again.
    let c = free_list.dealloc(512, 512);
    assert_eq!(c, FreeBlock { pos: 512, size: 1536 });

    assert_eq!(free_list.blocks(), &[FreeBlock { pos: 512, size: 1536 }]);
    assert!(free_list.is_well_formed());
}

#[test]
fn allocation_after_coalescing_reuses_the_merged_span() {
    let mut free_list = FreeList::new();
    free_list.dealloc(0, 2048);

    let outcome = free_list.alloc(512, 4096).unwrap();
    assert_eq!(outcome.position, 0);
    // the remainder is large enough to stay a free block rather than being
    // handed out as padding.
    assert!(outcome.split_remainder.is_some());
    assert!(free_list.is_well_formed());
}
