// Fantasy team data model: player records, team snapshots, and the analytic
// results (captain suggestions, cash-cow recommendations) fetched alongside.

pub mod analytics;
pub mod player;
pub mod team;
