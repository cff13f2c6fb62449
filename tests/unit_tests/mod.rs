mod constraints;
mod mesh;
mod space;
