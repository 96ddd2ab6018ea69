diesel::table! {
    departments (id) {
        id -> Uuid,
        name -> Text,
        description -> Nullable<Text>,
        color -> Text,
        manager_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    profiles (id) {
        id -> Uuid,
        full_name -> Text,
        role -> Text,
        department_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    tickets (id) {
        id -> Uuid,
        ticket_number -> Text,
        title -> Text,
        description -> Text,
        status -> Text,
        priority -> Text,
        tags -> Array<Text>,
        created_by -> Uuid,
        assigned_to -> Nullable<Uuid>,
        department_id -> Uuid,
        ai_confidence_score -> Nullable<Float8>,
        due_date -> Nullable<Timestamptz>,
        resolved_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    ticket_comments (id) {
        id -> Uuid,
        ticket_id -> Uuid,
        user_id -> Uuid,
        comment -> Text,
        is_internal -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    ticket_attachments (id) {
        id -> Uuid,
        ticket_id -> Uuid,
        file_name -> Text,
        file_url -> Text,
        file_size -> Int8,
        uploaded_by -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    ticket_history (id) {
        id -> Uuid,
        ticket_id -> Uuid,
        changed_by -> Uuid,
        field_name -> Text,
        old_value -> Nullable<Text>,
        new_value -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(tickets -> departments (department_id));
diesel::joinable!(ticket_comments -> tickets (ticket_id));
diesel::joinable!(ticket_comments -> profiles (user_id));
diesel::joinable!(ticket_attachments -> tickets (ticket_id));
diesel::joinable!(ticket_attachments -> profiles (uploaded_by));
diesel::joinable!(ticket_history -> tickets (ticket_id));
diesel::joinable!(ticket_history -> profiles (changed_by));

diesel::allow_tables_to_appear_in_same_query!(
    departments,
    profiles,
    tickets,
    ticket_comments,
    ticket_attachments,
    ticket_history,
);
