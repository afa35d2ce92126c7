//! PostgreSQL-backed store using diesel-async.

use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use diesel_async::AsyncConnection;
use scoped_futures::ScopedFutureExt;

use crate::db::pool::DbPool;
use crate::db::schema::{meetings, transcripts};
use crate::error::StoreError;
use crate::models::meeting::{Meeting, MeetingChangeset, MeetingRow, MeetingSummary, NewMeetingRow};
use crate::models::transcript::{NewTranscript, TranscriptChanges, TranscriptEntry};

use super::{CreateMeeting, MeetingChanges, MeetingPage, MeetingQuery, MeetingStore};

#[derive(Clone)]
pub struct PgMeetingStore {
    pool: DbPool,
}

impl PgMeetingStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn filtered(query: &MeetingQuery) -> meetings::BoxedQuery<'static, Pg> {
    let mut q = meetings::table
        .filter(meetings::user_id.eq(query.user_id))
        .into_boxed();

    if let Some(status) = query.status {
        q = q.filter(meetings::status.eq(status.as_str()));
    }

    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = format!("%{}%", search.trim());
        q = q.filter(
            meetings::title
                .ilike(pattern.clone())
                .or(meetings::description.assume_not_null().ilike(pattern)),
        );
    }

    if !query.tags.is_empty() {
        q = q.filter(meetings::tags.has_any_key(query.tags.clone()));
    }

    q
}

#[async_trait]
impl MeetingStore for PgMeetingStore {
    async fn get_meeting(&self, id: i64) -> Result<Option<Meeting>, StoreError> {
        let mut conn = self.pool.get().await?;

        let row: Option<MeetingRow> = diesel_async::RunQueryDsl::get_result(
            meetings::table.find(id).select(MeetingRow::as_select()),
            &mut conn,
        )
        .await
        .optional()?;

        row.map(Meeting::try_from).transpose()
    }

    async fn append_transcript(&self, entry: NewTranscript) -> Result<TranscriptEntry, StoreError> {
        let mut conn = self.pool.get().await?;

        let created: TranscriptEntry = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(transcripts::table)
                .values(entry)
                .returning(TranscriptEntry::as_returning()),
            &mut conn,
        )
        .await?;

        Ok(created)
    }

    async fn list_transcripts(&self, meeting_id: i64) -> Result<Vec<TranscriptEntry>, StoreError> {
        let mut conn = self.pool.get().await?;

        let entries: Vec<TranscriptEntry> = diesel_async::RunQueryDsl::load(
            transcripts::table
                .filter(transcripts::meeting_id.eq(meeting_id))
                .order((transcripts::timestamp.asc(), transcripts::id.asc()))
                .select(TranscriptEntry::as_select()),
            &mut conn,
        )
        .await?;

        Ok(entries)
    }

    async fn replace_summary(
        &self,
        meeting_id: i64,
        summary: &MeetingSummary,
    ) -> Result<(), StoreError> {
        let value = serde_json::to_value(summary)?;
        let mut conn = self.pool.get().await?;

        diesel_async::RunQueryDsl::execute(
            diesel::update(meetings::table.find(meeting_id)).set((
                meetings::summary.eq(Some(value)),
                meetings::updated_at.eq(Utc::now()),
            )),
            &mut conn,
        )
        .await?;

        Ok(())
    }

    async fn create_meeting(&self, meeting: CreateMeeting) -> Result<Meeting, StoreError> {
        let tags = serde_json::to_value(&meeting.tags)?;
        let speakers = serde_json::to_value(&meeting.speakers)?;
        let participants = serde_json::to_value(&meeting.participants)?;
        let now = Utc::now();
        let mut conn = self.pool.get().await?;

        let row: MeetingRow = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(meetings::table)
                .values(NewMeetingRow {
                    user_id: meeting.user_id,
                    title: &meeting.title,
                    description: meeting.description.as_deref(),
                    duration: meeting.duration,
                    start_time: meeting.start_time,
                    end_time: meeting.end_time,
                    audio_url: meeting.audio_url.as_deref(),
                    audio_size: meeting.audio_size,
                    status: meeting.status.as_str(),
                    tags,
                    speakers,
                    participants,
                    is_archived: false,
                    is_shared: false,
                    created_at: now,
                    updated_at: now,
                })
                .returning(MeetingRow::as_returning()),
            &mut conn,
        )
        .await?;

        Meeting::try_from(row)
    }

    async fn list_meetings(&self, query: &MeetingQuery) -> Result<MeetingPage, StoreError> {
        let mut conn = self.pool.get().await?;

        let total: i64 =
            diesel_async::RunQueryDsl::get_result(filtered(query).count(), &mut conn).await?;

        let rows: Vec<MeetingRow> = diesel_async::RunQueryDsl::load(
            filtered(query)
                .order((meetings::created_at.desc(), meetings::id.desc()))
                .limit(query.limit)
                .offset(query.offset())
                .select(MeetingRow::as_select()),
            &mut conn,
        )
        .await?;

        let meetings = rows
            .into_iter()
            .map(Meeting::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MeetingPage { meetings, total })
    }

    async fn update_meeting(
        &self,
        id: i64,
        changes: MeetingChanges,
    ) -> Result<Option<Meeting>, StoreError> {
        let now = Utc::now();
        let summary = changes
            .summary
            .map(|draft| serde_json::to_value(draft.stamp(now)))
            .transpose()?;
        let tags = changes.tags.map(serde_json::to_value).transpose()?;
        let speakers = changes.speakers.map(serde_json::to_value).transpose()?;
        let participants = changes.participants.map(serde_json::to_value).transpose()?;

        let changeset = MeetingChangeset {
            title: changes.title,
            description: changes.description,
            duration: changes.duration,
            end_time: changes.end_time,
            audio_url: changes.audio_url,
            audio_size: changes.audio_size,
            status: changes.status.map(|s| s.as_str().to_string()),
            summary,
            tags,
            speakers,
            participants,
            is_archived: changes.is_archived,
            is_shared: changes.is_shared,
            updated_at: now,
        };

        let mut conn = self.pool.get().await?;
        let row: Option<MeetingRow> = diesel_async::RunQueryDsl::get_result(
            diesel::update(meetings::table.find(id))
                .set(changeset)
                .returning(MeetingRow::as_returning()),
            &mut conn,
        )
        .await
        .optional()?;

        row.map(Meeting::try_from).transpose()
    }

    async fn delete_meeting(&self, id: i64) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await?;

        let deleted = conn
            .transaction::<_, StoreError, _>(|conn| {
                async move {
                    diesel_async::RunQueryDsl::execute(
                        diesel::delete(transcripts::table.filter(transcripts::meeting_id.eq(id))),
                        conn,
                    )
                    .await?;

                    let removed = diesel_async::RunQueryDsl::execute(
                        diesel::delete(meetings::table.find(id)),
                        conn,
                    )
                    .await?;

                    Ok(removed > 0)
                }
                .scope_boxed()
            })
            .await?;

        Ok(deleted)
    }

    async fn update_transcript(
        &self,
        meeting_id: i64,
        transcript_id: i64,
        changes: TranscriptChanges,
    ) -> Result<Option<TranscriptEntry>, StoreError> {
        let mut conn = self.pool.get().await?;

        let target = transcripts::table
            .filter(transcripts::id.eq(transcript_id))
            .filter(transcripts::meeting_id.eq(meeting_id));

        // An empty changeset is rejected by diesel; treat it as a read.
        if changes.is_empty() {
            let entry: Option<TranscriptEntry> = diesel_async::RunQueryDsl::get_result(
                target.select(TranscriptEntry::as_select()),
                &mut conn,
            )
            .await
            .optional()?;
            return Ok(entry);
        }

        let entry: Option<TranscriptEntry> = diesel_async::RunQueryDsl::get_result(
            diesel::update(target)
                .set(changes)
                .returning(TranscriptEntry::as_returning()),
            &mut conn,
        )
        .await
        .optional()?;

        Ok(entry)
    }
}
