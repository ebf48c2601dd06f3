// Read-only view of the core's profiles table; the worker only needs the
// device token.
diesel::table! {
    profiles (id) {
        id -> Uuid,
        push_token -> Nullable<Text>,
    }
}
