use super::*;

impl GameSession {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn push_event(
        &mut self,
        tick: u64,
        sequence_in_tick: &mut u64,
        event_type: EventType,
        question_index: Option<u32>,
        caused_by: Vec<String>,
        details: Option<serde_json::Value>,
    ) -> String {
        let sequence = *sequence_in_tick;
        *sequence_in_tick = sequence.saturating_add(1);

        let event_id = format!("evt:{tick}:{sequence}");
        self.state_hash = mix_event_hash(self.state_hash, &event_id, tick, sequence);

        self.event_log.push(Event {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            session_id: self.status.session_id.clone(),
            tick,
            created_at: synthetic_timestamp(tick, sequence),
            event_id: event_id.clone(),
            sequence_in_tick: sequence,
            event_type,
            question_index,
            caused_by,
            details,
        });
        event_id
    }
}
