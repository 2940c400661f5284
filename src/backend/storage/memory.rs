// src/backend/storage/memory.rs
use ic_stable_structures::memory_manager::{MemoryId, MemoryManager, VirtualMemory};
use ic_stable_structures::DefaultMemoryImpl;
use std::cell::RefCell;

// Memory IDs for stable structures. Never reuse or reorder.
pub const APPS_MEM_ID: MemoryId = MemoryId::new(0);
pub const PROMO_CODES_MEM_ID: MemoryId = MemoryId::new(1);
pub const TESTERS_MEM_ID: MemoryId = MemoryId::new(2);
pub const CREDENTIALS_MEM_ID: MemoryId = MemoryId::new(3);
pub const CODE_COUNTER_MEM_ID: MemoryId = MemoryId::new(4);
pub const CONFIG_MEM_ID: MemoryId = MemoryId::new(5);
pub const METRICS_MEM_ID: MemoryId = MemoryId::new(6);

pub type CanisterMemory = VirtualMemory<DefaultMemoryImpl>;

thread_local! {
    static MEMORY_MANAGER: RefCell<MemoryManager<DefaultMemoryImpl>> = RefCell::new(
        MemoryManager::init(DefaultMemoryImpl::default())
    );
}

/// Get the canister's memory instance for a specific MemoryId.
pub fn get_memory(id: MemoryId) -> CanisterMemory {
    MEMORY_MANAGER.with(|m| m.borrow().get(id))
}
