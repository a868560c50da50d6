use time::macros::{date, datetime, time};

use super::*;

fn keys(dashboard: &Dashboard) -> Vec<&'static str> {
    dashboard.widgets.iter().map(Widget::key).collect()
}

#[test]
fn empty_data_coalesces_to_zero_and_empty() {
    let dashboard = compose(Role::CampusAdmin, DashboardData::default());
    assert_eq!(dashboard.campus_name, "");
    assert_eq!(dashboard.user_name, "");
    for widget in &dashboard.widgets {
        match widget {
            Widget::Stat { value, .. } => assert_eq!(*value, 0),
            Widget::Percent { value, .. } => assert_eq!(*value, 0.0),
            Widget::Events { items, .. } => assert!(items.is_empty()),
            Widget::Activity { items, .. } => assert!(items.is_empty()),
        }
    }
}

#[test]
fn student_layout() {
    let data = DashboardData { my_attendance: Some(4), ..DashboardData::default() };
    let dashboard = compose(Role::Student, data);
    assert_eq!(keys(&dashboard), ["my_attendance", "upcoming_events"]);
    assert_eq!(
        dashboard.widgets[0],
        Widget::Stat { key: "my_attendance", label: "Events attended", value: 4 }
    );
}

#[test]
fn organizer_layout() {
    let dashboard = compose(Role::Organizer, DashboardData::default());
    assert_eq!(keys(&dashboard), ["total_events", "attendance_rate", "upcoming_events", "recent_attendance"]);
}

#[test]
fn admin_layouts_match() {
    let campus = compose(Role::CampusAdmin, DashboardData::default());
    let super_admin = compose(Role::SuperAdmin, DashboardData::default());
    assert_eq!(keys(&campus), keys(&super_admin));
    assert_eq!(
        keys(&campus),
        ["total_users", "total_events", "pending_reviews", "attendance_rate", "recent_attendance"]
    );
}

#[test]
fn loaded_values_pass_through() {
    let event = UpcomingEvent {
        id: Uuid::nil(),
        title: "Foundation Day".into(),
        date: date!(2025-09-01),
        start_time: time!(8:00),
        venue: "Quadrangle".into(),
    };
    let data = DashboardData {
        campus_name: Some("SNSU Main Campus".into()),
        user_name: Some("Maria Santos".into()),
        upcoming_events: Some(vec![event.clone()]),
        ..DashboardData::default()
    };
    let dashboard = compose(Role::Student, data);
    assert_eq!(dashboard.campus_name, "SNSU Main Campus");
    assert_eq!(dashboard.user_name, "Maria Santos");
    assert_eq!(
        dashboard.widgets[1],
        Widget::Events { key: "upcoming_events", label: "Upcoming events", items: vec![event] }
    );
}

#[test]
fn serializes_with_kind_tag() {
    let recent = RecentAttendance {
        full_name: "Juan Cruz".into(),
        event_title: "Orientation".into(),
        status: AttendanceStatus::Present,
        marked_at: datetime!(2025-06-02 0:00 UTC),
    };
    let data = DashboardData {
        attendance_rate: Some(87.5),
        recent_attendance: Some(vec![recent]),
        ..DashboardData::default()
    };
    let json = serde_json::to_value(compose(Role::Organizer, data)).unwrap();
    assert_eq!(json["role"], "organizer");
    assert_eq!(json["widgets"][1]["kind"], "percent");
    assert_eq!(json["widgets"][1]["value"], 87.5);
    assert_eq!(json["widgets"][3]["items"][0]["status"], "present");
}
