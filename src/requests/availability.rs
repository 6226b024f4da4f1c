use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::properties::parse_date_time;
use crate::requests::response::ServiceResult;
use crate::requests::{RequestContext, ServiceRequest};
use crate::xml::{EwsXmlWriter, XmlNode};

/// Times travel without offset; the request pins the time zone to UTC.
const LOCAL_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttendeeType {
    Organizer,
    #[default]
    Required,
    Optional,
    Room,
    Resource,
}

impl AttendeeType {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendeeType::Organizer => "Organizer",
            AttendeeType::Required => "Required",
            AttendeeType::Optional => "Optional",
            AttendeeType::Room => "Room",
            AttendeeType::Resource => "Resource",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendeeInfo {
    pub smtp_address: String,
    pub attendee_type: AttendeeType,
    pub exclude_conflicts: bool,
}

impl AttendeeInfo {
    pub fn new(smtp_address: impl Into<String>) -> Self {
        Self {
            smtp_address: smtp_address.into(),
            attendee_type: AttendeeType::Required,
            exclude_conflicts: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FreeBusyViewType {
    FreeBusy,
    #[default]
    FreeBusyMerged,
    Detailed,
    DetailedMerged,
}

impl FreeBusyViewType {
    pub fn as_str(self) -> &'static str {
        match self {
            FreeBusyViewType::FreeBusy => "FreeBusy",
            FreeBusyViewType::FreeBusyMerged => "FreeBusyMerged",
            FreeBusyViewType::Detailed => "Detailed",
            FreeBusyViewType::DetailedMerged => "DetailedMerged",
        }
    }

    fn is_merged(self) -> bool {
        matches!(
            self,
            FreeBusyViewType::FreeBusyMerged | FreeBusyViewType::DetailedMerged
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CalendarEvent {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub busy_type: String,
    pub subject: Option<String>,
    pub location: Option<String>,
}

impl CalendarEvent {
    fn from_node(node: &XmlNode) -> Self {
        let details = node.child("CalendarEventDetails");
        let detail = |name: &str| {
            details
                .and_then(|d| d.child_text(name))
                .map(str::to_string)
        };
        Self {
            start: node.child_text("StartTime").and_then(parse_local_time),
            end: node.child_text("EndTime").and_then(parse_local_time),
            busy_type: node.child_text("BusyType").unwrap_or("NoData").to_string(),
            subject: detail("Subject"),
            location: detail("Location"),
        }
    }
}

/// Free/busy information of one attendee.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttendeeAvailability {
    pub result: ServiceResult,
    pub view_type: Option<String>,
    /// One digit per merged interval: 0 free, 1 tentative, 2 busy, 3 OOF,
    /// 4 working elsewhere, 9 no data.
    pub merged_free_busy: Option<String>,
    pub calendar_events: Vec<CalendarEvent>,
}

fn parse_local_time(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), LOCAL_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
        .or_else(|| parse_date_time(raw))
}

#[derive(Debug, Clone)]
pub struct GetUserAvailability {
    pub attendees: Vec<AttendeeInfo>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub requested_view: FreeBusyViewType,
    pub merged_interval_minutes: u32,
}

impl GetUserAvailability {
    pub fn new(attendees: Vec<AttendeeInfo>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            attendees,
            start,
            end,
            requested_view: FreeBusyViewType::FreeBusyMerged,
            merged_interval_minutes: 30,
        }
    }
}

fn write_utc_transition(w: &mut EwsXmlWriter, element: &str) -> Result<()> {
    w.start_element("t", element)?;
    w.write_element_value("t", "Bias", "0")?;
    w.write_element_value("t", "Time", "00:00:00")?;
    w.write_element_value("t", "DayOrder", "1")?;
    w.write_element_value("t", "Month", "1")?;
    w.write_element_value("t", "DayOfWeek", "Sunday")?;
    w.end_element()
}

impl ServiceRequest for GetUserAvailability {
    type Response = Vec<AttendeeAvailability>;
    const NAME: &'static str = "GetUserAvailabilityRequest";

    fn write_body(&self, w: &mut EwsXmlWriter, _ctx: &RequestContext) -> Result<()> {
        if self.attendees.is_empty() {
            return Err(anyhow!("GetUserAvailability needs at least one attendee"));
        }
        if self.end <= self.start {
            return Err(anyhow!("availability window must end after it starts"));
        }
        if self.requested_view.is_merged() && self.merged_interval_minutes < 5 {
            return Err(anyhow!("merged free/busy interval must be at least 5 minutes"));
        }

        w.start_element("m", Self::NAME)?;

        w.start_element("t", "TimeZone")?;
        w.write_element_value("t", "Bias", "0")?;
        write_utc_transition(w, "StandardTime")?;
        write_utc_transition(w, "DaylightTime")?;
        w.end_element()?;

        w.start_element("m", "MailboxDataArray")?;
        for attendee in &self.attendees {
            w.start_element("t", "MailboxData")?;
            w.start_element("t", "Email")?;
            w.write_element_value("t", "Address", &attendee.smtp_address)?;
            w.end_element()?;
            w.write_element_value("t", "AttendeeType", attendee.attendee_type.as_str())?;
            w.write_element_value(
                "t",
                "ExcludeConflicts",
                if attendee.exclude_conflicts { "true" } else { "false" },
            )?;
            w.end_element()?;
        }
        w.end_element()?;

        w.start_element("t", "FreeBusyViewOptions")?;
        w.start_element("t", "TimeWindow")?;
        w.write_element_value("t", "StartTime", &self.start.format(LOCAL_TIME_FORMAT).to_string())?;
        w.write_element_value("t", "EndTime", &self.end.format(LOCAL_TIME_FORMAT).to_string())?;
        w.end_element()?;
        w.write_element_value(
            "t",
            "MergedFreeBusyIntervalInMinutes",
            &self.merged_interval_minutes.to_string(),
        )?;
        w.write_element_value("t", "RequestedView", self.requested_view.as_str())?;
        w.end_element()?;

        w.end_element()
    }

    fn parse_response(&self, content: &XmlNode, _ctx: &RequestContext) -> Result<Self::Response> {
        let responses = content
            .child("FreeBusyResponseArray")
            .ok_or_else(|| anyhow!("GetUserAvailability response has no FreeBusyResponseArray"))?;
        let out = responses
            .children_named("FreeBusyResponse")
            .map(|response| {
                let result = response
                    .child("ResponseMessage")
                    .map(ServiceResult::from_node)
                    .unwrap_or_default();
                let view = response.child("FreeBusyView");
                AttendeeAvailability {
                    result,
                    view_type: view
                        .and_then(|v| v.child_text("FreeBusyViewType"))
                        .map(str::to_string),
                    merged_free_busy: view
                        .and_then(|v| v.child_text("MergedFreeBusy"))
                        .map(str::to_string),
                    calendar_events: view
                        .and_then(|v| v.child("CalendarEventArray"))
                        .map(|events| {
                            events
                                .children_named("CalendarEvent")
                                .map(CalendarEvent::from_node)
                                .collect()
                        })
                        .unwrap_or_default(),
                }
            })
            .collect();
        Ok(out)
    }
}
