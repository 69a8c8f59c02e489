mod core;
mod table;

pub use self::core::{
    AnyRoute, DynamicRoute, Route, Screen, ScreenFactory, ScreenLifecycleEvent, StaticScreen,
};
pub use table::{RouteTable, StackKey, route_path};
