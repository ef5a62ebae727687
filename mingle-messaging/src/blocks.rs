use diesel::dsl::count_star;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use mingle_shared::errors::{AppError, AppResult};

use crate::schema::user_blocks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockStatus {
    pub a_blocks_b: bool,
    pub b_blocks_a: bool,
}

impl BlockStatus {
    pub fn any(&self) -> bool {
        self.a_blocks_b || self.b_blocks_a
    }
}

/// Read-side queries against the block relationship store. The table is owned
/// by another subsystem; this core never writes it. No caching: blocking is
/// rare and security-sensitive, so every check hits the store.
pub struct BlockGate;

impl BlockGate {
    /// True when either side of the pair has blocked the other.
    pub fn is_blocked(conn: &mut PgConnection, a: Uuid, b: Uuid) -> AppResult<bool> {
        let count: i64 = user_blocks::table
            .filter(
                user_blocks::blocker_id
                    .eq(a)
                    .and(user_blocks::blocked_id.eq(b))
                    .or(user_blocks::blocker_id
                        .eq(b)
                        .and(user_blocks::blocked_id.eq(a))),
            )
            .select(count_star())
            .first(conn)
            .map_err(|e| AppError::Database(e))?;

        Ok(count > 0)
    }

    pub fn status(conn: &mut PgConnection, a: Uuid, b: Uuid) -> AppResult<BlockStatus> {
        let pairs: Vec<(Uuid, Uuid)> = user_blocks::table
            .filter(
                user_blocks::blocker_id
                    .eq(a)
                    .and(user_blocks::blocked_id.eq(b))
                    .or(user_blocks::blocker_id
                        .eq(b)
                        .and(user_blocks::blocked_id.eq(a))),
            )
            .select((user_blocks::blocker_id, user_blocks::blocked_id))
            .load(conn)
            .map_err(|e| AppError::Database(e))?;

        Ok(BlockStatus {
            a_blocks_b: pairs.iter().any(|(blocker, _)| *blocker == a),
            b_blocks_a: pairs.iter().any(|(blocker, _)| *blocker == b),
        })
    }
}
