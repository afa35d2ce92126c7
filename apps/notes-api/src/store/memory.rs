//! In-process store used by tests and local development without Postgres.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::error::StoreError;
use crate::models::meeting::{Meeting, MeetingStatus, MeetingSummary};
use crate::models::transcript::{NewTranscript, TranscriptChanges, TranscriptEntry};

use super::{CreateMeeting, MeetingChanges, MeetingPage, MeetingQuery, MeetingStore};

#[derive(Default)]
struct State {
    next_meeting_id: i64,
    next_transcript_id: i64,
    meetings: HashMap<i64, Meeting>,
    transcripts: Vec<TranscriptEntry>,
}

#[derive(Default)]
pub struct MemoryMeetingStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
}

impl MemoryMeetingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a meeting with a fixed id.
    pub fn seed_meeting(&self, id: i64, user_id: i64, title: &str) -> Meeting {
        let now = Utc::now();
        let meeting = Meeting {
            id,
            user_id,
            title: title.to_string(),
            description: None,
            duration: 0,
            start_time: now,
            end_time: None,
            audio_url: None,
            audio_size: None,
            status: MeetingStatus::Recording,
            summary: None,
            tags: Vec::new(),
            speakers: Vec::new(),
            participants: Vec::new(),
            is_archived: false,
            is_shared: false,
            share_token: None,
            created_at: now,
            updated_at: now,
        };
        let mut state = self.state.lock();
        state.next_meeting_id = state.next_meeting_id.max(id);
        state.meetings.insert(id, meeting.clone());
        meeting
    }

    /// Reassign a meeting to another owner.
    pub fn transfer_meeting(&self, id: i64, new_owner: i64) {
        if let Some(meeting) = self.state.lock().meetings.get_mut(&id) {
            meeting.user_id = new_owner;
        }
    }

    /// Make every subsequent call fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }
}

fn matches_query(meeting: &Meeting, query: &MeetingQuery) -> bool {
    if meeting.user_id != query.user_id {
        return false;
    }
    if query.status.is_some_and(|s| s != meeting.status) {
        return false;
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let needle = search.to_lowercase();
        let in_title = meeting.title.to_lowercase().contains(&needle);
        let in_description = meeting
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(&needle));
        if !in_title && !in_description {
            return false;
        }
    }
    if !query.tags.is_empty() && !query.tags.iter().any(|t| meeting.tags.contains(t)) {
        return false;
    }
    true
}

#[async_trait]
impl MeetingStore for MemoryMeetingStore {
    async fn get_meeting(&self, id: i64) -> Result<Option<Meeting>, StoreError> {
        self.check_available()?;
        Ok(self.state.lock().meetings.get(&id).cloned())
    }

    async fn append_transcript(&self, entry: NewTranscript) -> Result<TranscriptEntry, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock();
        state.next_transcript_id += 1;
        let created = TranscriptEntry {
            id: state.next_transcript_id,
            meeting_id: entry.meeting_id,
            text: entry.text,
            timestamp: entry.timestamp,
            speaker_id: entry.speaker_id,
            speaker_name: entry.speaker_name,
            is_highlighted: entry.is_highlighted,
            confidence: entry.confidence,
            created_at: Utc::now(),
        };
        state.transcripts.push(created.clone());
        Ok(created)
    }

    async fn list_transcripts(&self, meeting_id: i64) -> Result<Vec<TranscriptEntry>, StoreError> {
        self.check_available()?;
        let mut entries: Vec<TranscriptEntry> = self
            .state
            .lock()
            .transcripts
            .iter()
            .filter(|t| t.meeting_id == meeting_id)
            .cloned()
            .collect();
        entries.sort_by_key(|t| (t.timestamp, t.id));
        Ok(entries)
    }

    async fn replace_summary(
        &self,
        meeting_id: i64,
        summary: &MeetingSummary,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        if let Some(meeting) = self.state.lock().meetings.get_mut(&meeting_id) {
            meeting.summary = Some(summary.clone());
            meeting.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn create_meeting(&self, input: CreateMeeting) -> Result<Meeting, StoreError> {
        self.check_available()?;
        let now = Utc::now();
        let mut state = self.state.lock();
        state.next_meeting_id += 1;
        let meeting = Meeting {
            id: state.next_meeting_id,
            user_id: input.user_id,
            title: input.title,
            description: input.description,
            duration: input.duration,
            start_time: input.start_time,
            end_time: input.end_time,
            audio_url: input.audio_url,
            audio_size: input.audio_size,
            status: input.status,
            summary: None,
            tags: input.tags,
            speakers: input.speakers,
            participants: input.participants,
            is_archived: false,
            is_shared: false,
            share_token: None,
            created_at: now,
            updated_at: now,
        };
        state.meetings.insert(meeting.id, meeting.clone());
        Ok(meeting)
    }

    async fn list_meetings(&self, query: &MeetingQuery) -> Result<MeetingPage, StoreError> {
        self.check_available()?;
        let mut found: Vec<Meeting> = self
            .state
            .lock()
            .meetings
            .values()
            .filter(|m| matches_query(m, query))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = found.len() as i64;
        let meetings = found
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .collect();

        Ok(MeetingPage { meetings, total })
    }

    async fn update_meeting(
        &self,
        id: i64,
        changes: MeetingChanges,
    ) -> Result<Option<Meeting>, StoreError> {
        self.check_available()?;
        let now = Utc::now();
        let mut state = self.state.lock();
        let Some(meeting) = state.meetings.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(title) = changes.title {
            meeting.title = title;
        }
        if let Some(description) = changes.description {
            meeting.description = Some(description);
        }
        if let Some(duration) = changes.duration {
            meeting.duration = duration;
        }
        if let Some(end_time) = changes.end_time {
            meeting.end_time = Some(end_time);
        }
        if let Some(audio_url) = changes.audio_url {
            meeting.audio_url = Some(audio_url);
        }
        if let Some(audio_size) = changes.audio_size {
            meeting.audio_size = Some(audio_size);
        }
        if let Some(status) = changes.status {
            meeting.status = status;
        }
        if let Some(draft) = changes.summary {
            meeting.summary = Some(draft.stamp(now));
        }
        if let Some(tags) = changes.tags {
            meeting.tags = tags;
        }
        if let Some(speakers) = changes.speakers {
            meeting.speakers = speakers;
        }
        if let Some(participants) = changes.participants {
            meeting.participants = participants;
        }
        if let Some(is_archived) = changes.is_archived {
            meeting.is_archived = is_archived;
        }
        if let Some(is_shared) = changes.is_shared {
            meeting.is_shared = is_shared;
        }
        meeting.updated_at = now;

        Ok(Some(meeting.clone()))
    }

    async fn delete_meeting(&self, id: i64) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock();
        state.transcripts.retain(|t| t.meeting_id != id);
        Ok(state.meetings.remove(&id).is_some())
    }

    async fn update_transcript(
        &self,
        meeting_id: i64,
        transcript_id: i64,
        changes: TranscriptChanges,
    ) -> Result<Option<TranscriptEntry>, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock();
        let Some(entry) = state
            .transcripts
            .iter_mut()
            .find(|t| t.id == transcript_id && t.meeting_id == meeting_id)
        else {
            return Ok(None);
        };

        if let Some(text) = changes.text {
            entry.text = text;
        }
        if let Some(timestamp) = changes.timestamp {
            entry.timestamp = timestamp;
        }
        if let Some(speaker_id) = changes.speaker_id {
            entry.speaker_id = Some(speaker_id);
        }
        if let Some(speaker_name) = changes.speaker_name {
            entry.speaker_name = Some(speaker_name);
        }
        if let Some(is_highlighted) = changes.is_highlighted {
            entry.is_highlighted = is_highlighted;
        }
        if let Some(confidence) = changes.confidence {
            entry.confidence = Some(confidence);
        }

        Ok(Some(entry.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(meeting_id: i64, text: &str, timestamp: i64) -> NewTranscript {
        NewTranscript {
            meeting_id,
            text: text.to_string(),
            timestamp,
            speaker_id: None,
            speaker_name: None,
            is_highlighted: false,
            confidence: None,
        }
    }

    #[tokio::test]
    async fn transcripts_are_listed_by_timestamp() {
        let store = MemoryMeetingStore::new();
        store.seed_meeting(1, 7, "standup");

        store.append_transcript(line(1, "second", 200)).await.unwrap();
        store.append_transcript(line(1, "first", 100)).await.unwrap();
        store.append_transcript(line(2, "other meeting", 50)).await.unwrap();

        let texts: Vec<String> = store
            .list_transcripts(1)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = MemoryMeetingStore::new();
        store.seed_meeting(1, 7, "standup");
        store.set_unavailable(true);
        assert!(matches!(store.get_meeting(1).await, Err(StoreError::Unavailable(_))));
        store.set_unavailable(false);
        assert!(store.get_meeting(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn list_meetings_filters_and_paginates() {
        let store = MemoryMeetingStore::new();
        for i in 0..5 {
            store
                .create_meeting(CreateMeeting {
                    user_id: 1,
                    title: format!("Planning {i}"),
                    description: None,
                    duration: 0,
                    start_time: Utc::now(),
                    end_time: None,
                    audio_url: None,
                    audio_size: None,
                    status: MeetingStatus::Completed,
                    tags: if i % 2 == 0 { vec!["even".into()] } else { vec![] },
                    speakers: Vec::new(),
                    participants: Vec::new(),
                })
                .await
                .unwrap();
        }
        store.seed_meeting(100, 2, "Planning elsewhere");

        let page = store
            .list_meetings(&MeetingQuery {
                user_id: 1,
                page: 2,
                limit: 2,
                status: None,
                search: Some("planning".into()),
                tags: vec![],
            })
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.meetings.len(), 2);

        let tagged = store
            .list_meetings(&MeetingQuery {
                user_id: 1,
                page: 1,
                limit: 20,
                status: None,
                search: None,
                tags: vec!["even".into()],
            })
            .await
            .unwrap();
        assert_eq!(tagged.total, 3);
    }

    #[tokio::test]
    async fn delete_meeting_drops_transcript() {
        let store = MemoryMeetingStore::new();
        store.seed_meeting(3, 1, "retro");
        store.append_transcript(line(3, "bye", 1)).await.unwrap();

        assert!(store.delete_meeting(3).await.unwrap());
        assert!(store.list_transcripts(3).await.unwrap().is_empty());
        assert!(!store.delete_meeting(3).await.unwrap());
    }
}
