mod auto_collapse_with_pin;
mod bind_mount_convergence;
mod cursor_replay_safety;
mod delete_is_tombstone;
mod discovery_then_read;
mod watcher_does_not_reactivate;
