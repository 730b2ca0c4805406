pub(crate) mod meta;
pub(crate) mod migrate;

#[cfg(any(feature = "github", feature = "bitbucket", feature = "cgit"))]
pub(crate) mod replay;

#[cfg(any(feature = "github", feature = "bitbucket", feature = "cgit"))]
pub(crate) mod run;
