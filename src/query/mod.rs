//! Query façade
//!
//! | operation                      | history | live | stages                                   |
//! |--------------------------------|---------|------|------------------------------------------|
//! | `current_events_for_entity`    | yes     | no   | scope filter, envelopes                  |
//! | `current_all_events`           | yes     | no   | envelopes                                |
//! | `events_for_entity`            | yes     | yes  | truncate, scope filter, dedup, envelopes |
//! | `all_events`                   | yes     | yes  | dedup, envelopes                         |
//! | `current_distinct_entity_ids`  | yes     | no   | distinct                                 |
//! | `all_distinct_entity_ids`      | yes     | yes  | distinct                                 |

mod config;
mod journal_query;

pub use config::QueryConfig;
pub use journal_query::JournalQuery;
